//! Options for talking to proxies, and the checks we run on them before
//! any network traffic happens.

use crate::err::ErrorKind;

use socks_proto::{
    AuthMethod, CustomAuth, RemoteHost, SocksAuth, SocksCmd, SocksRequest, SocksVersion,
};

use std::convert::TryFrom;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// How long a request may take, unless the options say otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The longest timeout we accept: `u32::MAX` milliseconds, a bit under
/// 50 days.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(u32::MAX as u64);

/// Every command that a single-proxy request may use.
pub(crate) const ALL_COMMANDS: &[SocksCmd] =
    &[SocksCmd::CONNECT, SocksCmd::BIND, SocksCmd::UDP_ASSOCIATE];

/// Result type used for option checks.
type Result<T> = std::result::Result<T, ErrorKind>;

/// Shorthand to build a validation error.
fn invalid(msg: impl Into<String>) -> ErrorKind {
    ErrorKind::Validation(msg.into())
}

/// Produces the bytes of a custom authentication message.
pub type AuthRequestFn = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;
/// Decides whether a custom authentication response means success.
pub type AuthCheckFn = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// A caller-supplied SOCKS5 authentication method, as configured.
///
/// All four fields must be set, or none of them.  The method number
/// must be in the private range `0x80..=0xFE`.
#[derive(Clone, Default)]
#[non_exhaustive]
pub struct CustomAuthOptions {
    /// The method number to offer.
    pub method: Option<u8>,
    /// Builds the message we send once the proxy picks our method.
    pub request: Option<AuthRequestFn>,
    /// How many bytes the proxy answers with.
    pub response_len: Option<usize>,
    /// Decides whether the proxy's answer means success.
    pub check: Option<AuthCheckFn>,
}

impl CustomAuthOptions {
    /// Return a set of custom authentication options with every field
    /// filled in.
    pub fn new<R, C>(method: u8, request: R, response_len: usize, check: C) -> Self
    where
        R: Fn() -> Vec<u8> + Send + Sync + 'static,
        C: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        CustomAuthOptions {
            method: Some(method),
            request: Some(Arc::new(request)),
            response_len: Some(response_len),
            check: Some(Arc::new(check)),
        }
    }

    /// Return the number of fields that are set.
    fn n_present(&self) -> usize {
        [
            self.method.is_some(),
            self.request.is_some(),
            self.response_len.is_some(),
            self.check.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count()
    }

    /// Check these options, and turn them into a [`CustomAuth`].
    fn to_custom_auth(&self) -> Result<CustomAuth> {
        if self.n_present() != 4 {
            return Err(invalid(
                "custom authentication needs a method, a request, a response length, and a check",
            ));
        }
        match (&self.method, &self.request, &self.response_len, &self.check) {
            (Some(method), Some(request), Some(response_len), Some(check)) => {
                let method = AuthMethod::from(*method);
                if !method.is_private() {
                    return Err(invalid(format!(
                        "custom authentication method {:#04x} is outside 0x80..=0xFE",
                        u8::from(method)
                    )));
                }
                let request = Arc::clone(request);
                let check = Arc::clone(check);
                CustomAuth::new(
                    method,
                    move || request(),
                    *response_len,
                    move |r: &[u8]| check(r),
                )
                .map_err(|e| invalid(e.to_string()))
            }
            _ => Err(invalid("incomplete custom authentication")),
        }
    }
}

impl fmt::Debug for CustomAuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAuthOptions")
            .field("method", &self.method)
            .field("request", &self.request.as_ref().map(|_| ".."))
            .field("response_len", &self.response_len)
            .field("check", &self.check.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A user ID and password to give to a proxy.
///
/// SOCKS4 proxies only see the user ID.
#[derive(Clone, PartialEq, Eq)]
#[allow(clippy::exhaustive_structs)]
pub struct Credentials {
    /// The user ID.
    pub user_id: String,
    /// The password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// A SOCKS proxy that we can use.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ProxyDescriptor {
    /// The proxy's IP address.
    pub address: String,
    /// The proxy's TCP port.
    pub port: u16,
    /// The SOCKS version that the proxy speaks: 4 or 5.
    pub version: u8,
    /// Credentials to offer, if any.
    pub credentials: Option<Credentials>,
    /// A custom SOCKS5 authentication method to offer, if any.
    pub custom_auth: Option<CustomAuthOptions>,
}

impl ProxyDescriptor {
    /// Describe a proxy at `address`:`port`, speaking SOCKS `version`,
    /// that wants no authentication.
    pub fn new(address: impl Into<String>, port: u16, version: u8) -> Self {
        ProxyDescriptor {
            address: address.into(),
            port,
            version,
            credentials: None,
            custom_auth: None,
        }
    }

    /// Offer `user_id` and `password` to this proxy.
    pub fn with_credentials(mut self, user_id: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user_id: user_id.into(),
            password: password.into(),
        });
        self
    }

    /// Offer a custom authentication method to this proxy.
    pub fn with_custom_auth(mut self, custom: CustomAuthOptions) -> Self {
        self.custom_auth = Some(custom);
        self
    }

    /// Return this proxy's location as a host and port.
    pub fn remote_host(&self) -> RemoteHost {
        RemoteHost::new(self.address.clone(), self.port)
    }

    /// Return the socket address at which we can reach this proxy.
    pub(crate) fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.parse().map_err(|_| {
            invalid(format!(
                "proxy address {:?} is not an IP address",
                self.address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Return the SOCKS version of this proxy.
    fn socks_version(&self) -> Result<SocksVersion> {
        SocksVersion::try_from(self.version)
            .map_err(|_| invalid(format!("unsupported SOCKS version {}", self.version)))
    }

    /// Check that this proxy is well-formed, and return the
    /// authentication to offer it.
    fn validate(&self) -> Result<(SocksVersion, IpAddr, SocksAuth)> {
        let ip = self.socket_addr()?.ip();
        let version = self.socks_version()?;
        let mut auth = SocksAuth::new();
        if let Some(c) = &self.credentials {
            match version {
                SocksVersion::V4 => {
                    if c.user_id.contains('\0') {
                        return Err(invalid("SOCKS4 user ID may not contain a NUL byte"));
                    }
                }
                SocksVersion::V5 => {
                    if c.user_id.len() > 255 || c.password.len() > 255 {
                        return Err(invalid(
                            "SOCKS5 user ID and password must be under 256 bytes",
                        ));
                    }
                }
            }
            auth = auth.with_credentials(c.user_id.as_bytes(), c.password.as_bytes());
        }
        if let Some(custom) = &self.custom_auth {
            let custom = custom.to_custom_auth()?;
            if version != SocksVersion::V5 {
                return Err(invalid("custom authentication needs SOCKS5"));
            }
            auth = auth.with_custom(custom);
        }
        Ok((version, ip, auth))
    }
}

/// What to do with the timeout once a BIND request has been granted.
///
/// After a proxy reports where it is listening, the peer may take a
/// long time to show up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BoundTimeout {
    /// Stop the timer: wait for the peer for as long as it takes.
    Cancel,
    /// Leave the timer running: the peer has to arrive before the
    /// original deadline.
    Keep,
    /// Start a fresh timer of the full timeout when the proxy reports
    /// where it is listening.
    Rearm,
}

impl Default for BoundTimeout {
    fn default() -> Self {
        BoundTimeout::Cancel
    }
}

/// Options for one request through one proxy.
#[derive(Clone, Debug)]
pub struct SocksClientOptions {
    /// What to ask the proxy to do.
    command: SocksCmd,
    /// Where to ask the proxy to connect (or, for BIND and
    /// UDP_ASSOCIATE, where we expect traffic from).
    destination: RemoteHost,
    /// The proxy to use.
    proxy: ProxyDescriptor,
    /// How long we give the proxy to finish.
    timeout: Duration,
    /// What happens to the timeout after a BIND is granted.
    bound_timeout: BoundTimeout,
}

impl SocksClientOptions {
    /// Return options for a CONNECT to `destination` via `proxy`, with
    /// the default timeout.
    pub fn new(destination: RemoteHost, proxy: ProxyDescriptor) -> Self {
        SocksClientOptions {
            command: SocksCmd::CONNECT,
            destination,
            proxy,
            timeout: DEFAULT_TIMEOUT,
            bound_timeout: BoundTimeout::default(),
        }
    }

    /// Use `command` instead of CONNECT.
    pub fn with_command(mut self, command: SocksCmd) -> Self {
        self.command = command;
        self
    }

    /// Use `timeout` instead of the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `policy` for the timeout after a BIND is granted.
    pub fn with_bound_timeout(mut self, policy: BoundTimeout) -> Self {
        self.bound_timeout = policy;
        self
    }

    /// Return the command to send.
    pub fn command(&self) -> SocksCmd {
        self.command
    }

    /// Return the destination of the request.
    pub fn destination(&self) -> &RemoteHost {
        &self.destination
    }

    /// Return the proxy to use.
    pub fn proxy(&self) -> &ProxyDescriptor {
        &self.proxy
    }

    /// Return how long the proxy has to finish.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return the policy for the timeout after a BIND is granted.
    pub fn bound_timeout(&self) -> BoundTimeout {
        self.bound_timeout
    }

    /// Check these options, for use with a caller that supports the
    /// commands in `allowed`.
    ///
    /// On success, return the request to send to the proxy.
    pub fn validate(&self, allowed: &[SocksCmd]) -> Result<SocksRequest> {
        if !allowed.contains(&self.command) {
            return Err(invalid(format!(
                "command {} is not supported here",
                self.command
            )));
        }
        check_destination(&self.destination)?;
        check_timeout(self.timeout)?;
        let (version, proxy_ip, auth) = self.proxy.validate()?;
        SocksRequest::new(
            version,
            self.command,
            self.destination.clone(),
            proxy_ip,
            auth,
        )
        .map_err(|e| invalid(e.to_string()))
    }
}

/// Options for a CONNECT request through a chain of proxies.
#[derive(Clone, Debug)]
pub struct ChainOptions {
    /// What to ask the last proxy to do.  Only CONNECT works.
    command: SocksCmd,
    /// Where the last proxy should connect.
    destination: RemoteHost,
    /// The proxies, in the order to use them (unless `randomize`).
    proxies: Vec<ProxyDescriptor>,
    /// If true, use the proxies in a random order.
    randomize: bool,
    /// How long each hop has to finish.
    timeout: Duration,
}

impl ChainOptions {
    /// Return options for a CONNECT to `destination` through `proxies`.
    pub fn new(destination: RemoteHost, proxies: Vec<ProxyDescriptor>) -> Self {
        ChainOptions {
            command: SocksCmd::CONNECT,
            destination,
            proxies,
            randomize: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use `command` instead of CONNECT.
    ///
    /// Chains only support CONNECT, so any other command will fail
    /// validation.
    pub fn with_command(mut self, command: SocksCmd) -> Self {
        self.command = command;
        self
    }

    /// If `randomize` is true, use the proxies in a random order.
    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Use `timeout` for each hop, instead of the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return the command for the last proxy.
    pub fn command(&self) -> SocksCmd {
        self.command
    }

    /// Return the final destination.
    pub fn destination(&self) -> &RemoteHost {
        &self.destination
    }

    /// Return the proxies in this chain.
    pub fn proxies(&self) -> &[ProxyDescriptor] {
        &self.proxies[..]
    }

    /// Return true if the proxies should be used in a random order.
    pub fn randomize(&self) -> bool {
        self.randomize
    }

    /// Return how long each hop has to finish.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check these options.
    pub fn validate(&self) -> Result<()> {
        if self.command != SocksCmd::CONNECT {
            return Err(invalid("proxy chains only support CONNECT"));
        }
        if self.proxies.len() < 2 {
            return Err(invalid("a proxy chain needs at least two proxies"));
        }
        check_destination(&self.destination)?;
        check_timeout(self.timeout)?;
        for p in &self.proxies {
            p.validate()?;
        }
        Ok(())
    }

    /// Return the options for one hop: a CONNECT through `proxy` to
    /// `destination`.
    pub(crate) fn hop(&self, proxy: &ProxyDescriptor, destination: RemoteHost) -> SocksClientOptions {
        SocksClientOptions::new(destination, proxy.clone()).with_timeout(self.timeout)
    }
}

/// Check that `host` can be sent to a proxy.
fn check_destination(host: &RemoteHost) -> Result<()> {
    if host.host().is_empty() {
        return Err(invalid("destination host is empty"));
    }
    if host.host().len() > 255 {
        return Err(invalid("destination host is longer than 255 bytes"));
    }
    Ok(())
}

/// Check that `timeout` is usable.
fn check_timeout(timeout: Duration) -> Result<()> {
    if timeout == Duration::from_secs(0) {
        return Err(invalid("timeout must be positive"));
    }
    if timeout > MAX_TIMEOUT {
        return Err(invalid(format!(
            "timeout of {}ms exceeds {}ms",
            timeout.as_millis(),
            MAX_TIMEOUT.as_millis()
        )));
    }
    Ok(())
}
