//! Structures that represent SOCKS messages

use crate::{Error, Result};

use caret::caret_int;
use socks_bytes::Error as BytesError;
use socks_bytes::Result as BytesResult;
use socks_bytes::{Readable, Reader, Writeable, Writer};

use std::convert::TryFrom;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

/// A version of the SOCKS protocol that we can speak to a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksVersion {
    /// SOCKS4, or SOCKS4a when the destination is a hostname.
    V4,
    /// SOCKS5.
    V5,
}

impl SocksVersion {
    /// Return the version byte that starts messages in this version.
    pub fn byte(self) -> u8 {
        match self {
            SocksVersion::V4 => 4,
            SocksVersion::V5 => 5,
        }
    }
}

impl TryFrom<u8> for SocksVersion {
    type Error = Error;
    fn try_from(v: u8) -> Result<SocksVersion> {
        match v {
            4 => Ok(SocksVersion::V4),
            5 => Ok(SocksVersion::V5),
            _ => Err(Error::NoSupport("SOCKS version must be 4 or 5")),
        }
    }
}

impl fmt::Display for SocksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SOCKS{}", self.byte())
    }
}

caret_int! {
    /// Command telling the proxy what we want it to do.
    pub struct SocksCmd(u8) {
        /// Connect to a remote TCP address:port.
        CONNECT = 1,
        /// Listen for one incoming TCP connection on our behalf.
        BIND = 2,
        /// Relay UDP datagrams for us.  (SOCKS5 only.)
        UDP_ASSOCIATE = 3,
    }
}

caret_int! {
    /// Possible reply status values from a SOCKS5 handshake.
    ///
    /// Note that the documentation for these values is kind of scant,
    /// and is limited to what the RFC says.
    pub struct SocksStatus(u8) {
        /// RFC 1928: "succeeded"
        SUCCEEDED = 0x00,
        /// RFC 1928: "general SOCKS server failure"
        GENERAL_FAILURE = 0x01,
        /// RFC 1928: "connection not allowable by ruleset"
        ///
        /// (This is the only occurrence of 'ruleset' or even 'rule'
        /// in RFC 1928.)
        NOT_ALLOWED = 0x02,
        /// RFC 1928: "Network unreachable"
        NETWORK_UNREACHABLE = 0x03,
        /// RFC 1928: "Host unreachable"
        HOST_UNREACHABLE = 0x04,
        /// RFC 1928: "Connection refused"
        CONNECTION_REFUSED = 0x05,
        /// RFC 1928: "TTL expired"
        ///
        /// (This is the only occurrence of 'TTL' in RFC 1928.)
        TTL_EXPIRED = 0x06,
        /// RFC 1928: "Command not supported"
        COMMAND_NOT_SUPPORTED = 0x07,
        /// RFC 1928: "Address type not supported"
        ADDRTYPE_NOT_SUPPORTED = 0x08,
    }
}

caret_int! {
    /// Possible reply status values from a SOCKS4 or SOCKS4a handshake.
    pub struct Socks4Status(u8) {
        /// Request granted.
        GRANTED = 0x5A,
        /// Request rejected or failed.
        FAILED = 0x5B,
        /// Request rejected because the proxy couldn't reach our identd.
        REJECTED = 0x5C,
        /// Request rejected because our identd reported a different
        /// user ID.
        REJECTED_IDENT = 0x5D,
    }
}

caret_int! {
    /// A SOCKS5 authentication method.
    pub struct AuthMethod(u8) {
        /// No authentication at all.
        NO_AUTH = 0x00,
        /// GSSAPI.  (Never offered.)
        GSSAPI = 0x01,
        /// RFC 1929 username and password.
        USERNAME_PASSWORD = 0x02,
        /// Sent by the proxy when it likes none of our methods.
        NO_ACCEPTABLE = 0xFF,
    }
}

caret_int! {
    /// The address type field used by SOCKS5 messages and UDP frames.
    pub struct AddrType(u8) {
        /// Four bytes of IPv4 address.
        IPV4 = 0x01,
        /// A length-prefixed hostname.
        DOMAIN = 0x03,
        /// Sixteen bytes of IPv6 address.
        IPV6 = 0x04,
    }
}

impl AuthMethod {
    /// Return true if this method is in the range that RFC 1928
    /// reserves for private methods.
    pub fn is_private(self) -> bool {
        (0x80..=0xFE).contains(&u8::from(self))
    }
}

/// A host and a port: the destination of a request, or an address
/// that the proxy reports back to us.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteHost {
    /// A hostname, or the string form of an IP address.
    host: String,
    /// The TCP or UDP port.
    port: u16,
}

impl RemoteHost {
    /// Construct a new RemoteHost.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        RemoteHost {
            host: host.into(),
            port,
        }
    }

    /// Return the host part of this RemoteHost.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Return the port of this RemoteHost.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Return this host as an IP address, if it is written as one.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// Return the address that a SOCKS message uses to encode this
    /// host.
    pub fn addr(&self) -> Result<SocksAddr> {
        SocksAddr::from_host(&self.host)
    }
}

impl fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for RemoteHost {
    type Err = Error;
    /// Parse a string of the form `host:port`, or `[v6addr]:port`.
    fn from_str(s: &str) -> Result<RemoteHost> {
        if let Ok(sa) = s.parse::<SocketAddr>() {
            return Ok(sa.into());
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or(Error::BadRequest("address has no port"))?;
        if host.is_empty() || host.contains(':') {
            return Err(Error::BadRequest("malformed host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::BadRequest("port must be in range 0..=65535"))?;
        Ok(RemoteHost::new(host, port))
    }
}

impl From<SocketAddr> for RemoteHost {
    fn from(sa: SocketAddr) -> RemoteHost {
        RemoteHost::new(sa.ip().to_string(), sa.port())
    }
}

/// An address sent or received as part of a SOCKS handshake
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksAddr {
    /// A regular DNS hostname.
    Hostname(SocksHostname),
    /// An IP address.
    Ip(IpAddr),
}

/// A hostname for use with SOCKS.  It is limited in length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocksHostname(String);

impl SocksAddr {
    /// Choose how to encode `host`.
    ///
    /// A literal IPv4 address is sent as IPv4; failing that, a literal
    /// IPv6 address is sent as IPv6; anything else is a hostname.
    pub fn from_host(host: &str) -> Result<SocksAddr> {
        if let Ok(ip4) = host.parse::<Ipv4Addr>() {
            Ok(SocksAddr::Ip(ip4.into()))
        } else if let Ok(ip6) = host.parse::<Ipv6Addr>() {
            Ok(SocksAddr::Ip(ip6.into()))
        } else {
            Ok(SocksAddr::Hostname(SocksHostname::try_from(
                host.to_string(),
            )?))
        }
    }

    /// Return the type byte that SOCKS5 uses for this address.
    pub fn addr_type(&self) -> AddrType {
        match self {
            SocksAddr::Ip(IpAddr::V4(_)) => AddrType::IPV4,
            SocksAddr::Ip(IpAddr::V6(_)) => AddrType::IPV6,
            SocksAddr::Hostname(_) => AddrType::DOMAIN,
        }
    }

    /// Return true if this is the IPv4 address `0.0.0.0`.
    ///
    /// Proxies report this when they can't tell us the address they
    /// are really listening on.
    pub fn is_unspecified_v4(&self) -> bool {
        matches!(self, SocksAddr::Ip(IpAddr::V4(ip)) if ip.is_unspecified())
    }
}

impl TryFrom<String> for SocksHostname {
    type Error = Error;
    fn try_from(s: String) -> Result<SocksHostname> {
        if s.is_empty() {
            Err(Error::BadRequest("empty hostname"))
        } else if s.len() > 255 {
            Err(Error::BadRequest("hostname too long"))
        } else {
            Ok(SocksHostname(s))
        }
    }
}

impl AsRef<str> for SocksHostname {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<SocksHostname> for String {
    fn from(s: SocksHostname) -> String {
        s.0
    }
}

impl fmt::Display for SocksAddr {
    /// Format a string (a hostname or IP address) corresponding to this
    /// SocksAddr.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksAddr::Ip(a) => write!(f, "{}", a),
            SocksAddr::Hostname(h) => write!(f, "{}", h.0),
        }
    }
}

impl Readable for SocksAddr {
    fn take_from(r: &mut Reader<'_>) -> BytesResult<SocksAddr> {
        let atype: AddrType = r.take_u8()?.into();
        match atype {
            AddrType::IPV4 => {
                let ip4: Ipv4Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip4.into()))
            }
            AddrType::DOMAIN => {
                let hostname = r.take_u8_prefixed()?;
                let hostname = std::str::from_utf8(hostname)
                    .map_err(|_| BytesError::BadMessage("bad utf8 on hostname"))?
                    .to_string();
                let hostname = SocksHostname::try_from(hostname)
                    .map_err(|_| BytesError::BadMessage("empty hostname"))?;
                Ok(SocksAddr::Hostname(hostname))
            }
            AddrType::IPV6 => {
                let ip6: Ipv6Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip6.into()))
            }
            _ => Err(BytesError::BadMessage("unrecognized address type.")),
        }
    }
}

impl Writeable for SocksAddr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        w.write_u8(self.addr_type().into());
        match self {
            SocksAddr::Ip(IpAddr::V4(ip)) => w.write(ip),
            SocksAddr::Ip(IpAddr::V6(ip)) => w.write(ip),
            SocksAddr::Hostname(h) => {
                // SocksHostname::try_from keeps this below 256.
                let hlen = h.0.len() as u8;
                w.write_u8(hlen);
                w.write(h.0.as_bytes());
            }
        }
    }
}

/// A caller-supplied SOCKS5 authentication method.
///
/// When the proxy selects `method`, we send whatever `request` returns,
/// read exactly `response_len` bytes back, and let `check` decide
/// whether they mean success.
#[derive(Clone)]
pub struct CustomAuth {
    /// The method number; in the private range 0x80..=0xFE.
    method: AuthMethod,
    /// Produces the bytes of our authentication message.
    request: Arc<dyn Fn() -> Vec<u8> + Send + Sync>,
    /// How many bytes the proxy answers with.
    response_len: usize,
    /// Decides whether the proxy's answer means success.
    check: Arc<dyn Fn(&[u8]) -> bool + Send + Sync>,
}

impl CustomAuth {
    /// Construct a new CustomAuth.
    ///
    /// Fails if `method` is not a private method number, or if
    /// `response_len` is zero.
    pub fn new<R, C>(method: AuthMethod, request: R, response_len: usize, check: C) -> Result<Self>
    where
        R: Fn() -> Vec<u8> + Send + Sync + 'static,
        C: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        if !method.is_private() {
            return Err(Error::BadRequest(
                "custom authentication method must be in range 0x80..=0xFE",
            ));
        }
        if response_len == 0 {
            return Err(Error::BadRequest(
                "custom authentication response length must be positive",
            ));
        }
        Ok(CustomAuth {
            method,
            request: Arc::new(request),
            response_len,
            check: Arc::new(check),
        })
    }

    /// Return the method number that we offer for this authentication.
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// Return the number of bytes that the proxy answers with.
    pub fn response_len(&self) -> usize {
        self.response_len
    }

    /// Build our authentication message.
    pub(crate) fn request(&self) -> Vec<u8> {
        (self.request)()
    }

    /// Return true if `response` means that authentication succeeded.
    pub(crate) fn check(&self, response: &[u8]) -> bool {
        (self.check)(response)
    }
}

impl fmt::Debug for CustomAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAuth")
            .field("method", &self.method)
            .field("response_len", &self.response_len)
            .finish()
    }
}

/// Authentication that we're willing to use with a proxy.
///
/// With SOCKS4, only the user ID of the credentials is used.  With
/// SOCKS5, "no authentication" is always offered, along with
/// username/password if there are credentials, and the custom method if
/// there is one.
#[derive(Clone, Debug, Default)]
pub struct SocksAuth {
    /// A user ID and password.
    credentials: Option<(Vec<u8>, Vec<u8>)>,
    /// A custom SOCKS5 method.
    custom: Option<CustomAuth>,
}

impl SocksAuth {
    /// Return a SocksAuth that offers no authentication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `user_id` and `password`.
    pub fn with_credentials(mut self, user_id: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        self.credentials = Some((user_id.into(), password.into()));
        self
    }

    /// Offer `custom` as a SOCKS5 authentication method.
    pub fn with_custom(mut self, custom: CustomAuth) -> Self {
        self.custom = Some(custom);
        self
    }

    /// Return the configured user ID, if any.
    pub fn user_id(&self) -> Option<&[u8]> {
        self.credentials.as_ref().map(|(u, _)| &u[..])
    }

    /// Return the configured password, if any.
    pub fn password(&self) -> Option<&[u8]> {
        self.credentials.as_ref().map(|(_, p)| &p[..])
    }

    /// Return the custom authentication method, if any.
    pub fn custom(&self) -> Option<&CustomAuth> {
        self.custom.as_ref()
    }

    /// Return the SOCKS5 methods that we offer, in the order we offer
    /// them.
    pub fn offered_methods(&self) -> Vec<AuthMethod> {
        let mut methods = vec![AuthMethod::NO_AUTH];
        if self.credentials.is_some() {
            methods.push(AuthMethod::USERNAME_PASSWORD);
        }
        if let Some(c) = &self.custom {
            methods.push(c.method());
        }
        methods
    }
}

/// Everything we need to know in order to ask a proxy for something.
#[derive(Clone, Debug)]
pub struct SocksRequest {
    /// SOCKS protocol version to speak.
    version: SocksVersion,
    /// The command to send.
    cmd: SocksCmd,
    /// Where we want the proxy to connect (or, for BIND and
    /// UDP_ASSOCIATE, where we expect traffic from).
    destination: RemoteHost,
    /// How `destination` goes on the wire.
    addr: SocksAddr,
    /// The proxy's own address.
    proxy_addr: IpAddr,
    /// Authentication to offer.
    auth: SocksAuth,
}

impl SocksRequest {
    /// Create a SocksRequest with a given set of fields.
    ///
    /// Return an error if the inputs can't be expressed in the
    /// requested SOCKS version.
    pub fn new(
        version: SocksVersion,
        cmd: SocksCmd,
        destination: RemoteHost,
        proxy_addr: IpAddr,
        auth: SocksAuth,
    ) -> Result<Self> {
        match (version, cmd) {
            (_, SocksCmd::CONNECT) | (_, SocksCmd::BIND) => {}
            (SocksVersion::V5, SocksCmd::UDP_ASSOCIATE) => {}
            (SocksVersion::V4, SocksCmd::UDP_ASSOCIATE) => {
                return Err(Error::NoSupport("SOCKS4 has no UDP_ASSOCIATE"));
            }
            (_, _) => return Err(Error::NoSupport("unrecognized command")),
        }
        let addr = destination.addr()?;

        match version {
            SocksVersion::V4 => {
                if auth.user_id().map_or(false, |u| u.contains(&0)) {
                    return Err(Error::BadRequest("SOCKS4 user ID contains a NUL byte"));
                }
                if let SocksAddr::Hostname(h) = &addr {
                    if h.0.contains('\0') {
                        return Err(Error::BadRequest("hostname contains a NUL byte"));
                    }
                }
            }
            SocksVersion::V5 => {
                if let Some((u, p)) = &auth.credentials {
                    if u.len() > 255 || p.len() > 255 {
                        return Err(Error::BadRequest(
                            "SOCKS5 user ID and password must be under 256 bytes",
                        ));
                    }
                }
            }
        }

        Ok(SocksRequest {
            version,
            cmd,
            destination,
            addr,
            proxy_addr,
            auth,
        })
    }

    /// Return the SOCKS version we speak.
    pub fn version(&self) -> SocksVersion {
        self.version
    }

    /// Return the command that we send.
    pub fn command(&self) -> SocksCmd {
        self.cmd
    }

    /// Return the destination of this request.
    pub fn destination(&self) -> &RemoteHost {
        &self.destination
    }

    /// Return the address of the proxy itself.
    pub fn proxy_addr(&self) -> IpAddr {
        self.proxy_addr
    }

    /// Return the authentication that we offer.
    pub fn auth(&self) -> &SocksAuth {
        &self.auth
    }

    /// Encode a SOCKS4 or SOCKS4a request.
    pub(crate) fn s4_request(&self) -> Vec<u8> {
        let mut w = Vec::new();
        w.write_u8(4);
        w.write_u8(self.cmd.into());
        w.write_u16(self.destination.port());
        let user_id = self.auth.user_id().unwrap_or(&[]);
        match &self.addr {
            SocksAddr::Ip(IpAddr::V4(ip)) => {
                w.write(ip);
                w.write_nul_terminated(user_id);
            }
            addr => {
                // SOCKS4a: 0.0.0.x, with the hostname after the user ID.
                w.write_u32(1);
                w.write_nul_terminated(user_id);
                w.write_nul_terminated(addr.to_string().as_bytes());
            }
        }
        w
    }

    /// Encode a SOCKS5 greeting, offering our authentication methods.
    pub(crate) fn s5_greeting(&self) -> Vec<u8> {
        let methods = self.auth.offered_methods();
        let mut w = Vec::new();
        w.write_u8(5);
        w.write_u8(methods.len() as u8);
        for m in methods {
            w.write_u8(m.into());
        }
        w
    }

    /// Encode an RFC 1929 username/password message.
    pub(crate) fn s5_userpass(&self) -> Vec<u8> {
        let (user, pass) = match &self.auth.credentials {
            Some((u, p)) => (&u[..], &p[..]),
            None => (&[][..], &[][..]),
        };
        let mut w = Vec::new();
        w.write_u8(1);
        w.write_u8(user.len() as u8);
        w.write_all(user);
        w.write_u8(pass.len() as u8);
        w.write_all(pass);
        w
    }

    /// Encode a SOCKS5 command request.
    pub(crate) fn s5_request(&self) -> Vec<u8> {
        let mut w = Vec::new();
        w.write_u8(5);
        w.write_u8(self.cmd.into());
        w.write_u8(0); // reserved.
        w.write(&self.addr);
        w.write_u16(self.destination.port());
        w
    }

    /// Turn an address that the proxy reported into a RemoteHost.
    ///
    /// If `normalize` is set, `0.0.0.0` becomes the proxy's own address.
    pub(crate) fn reported_host(&self, addr: SocksAddr, port: u16, normalize: bool) -> RemoteHost {
        if normalize && addr.is_unspecified_v4() {
            RemoteHost::new(self.proxy_addr.to_string(), port)
        } else {
            RemoteHost::new(addr.to_string(), port)
        }
    }
}
