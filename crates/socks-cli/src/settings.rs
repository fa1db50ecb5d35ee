//! Configuration for `socksc`.
//!
//! Configuration comes from (in increasing order of priority) the
//! built-in defaults, toml files, and `-c` options on the command line.
//! It's all merged with the `config` crate, and then deserialized into
//! a [`SockscConfig`].

use crate::cmdline::CmdLine;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use socks_client::{
    BoundTimeout, ChainOptions, ProxyDescriptor, RemoteHost, SocksClientOptions, SocksCmd,
};

/// Default options to use for our configuration.
pub(crate) const SOCKSC_DEFAULTS: &str = include_str!("./socksc_defaults.toml");

/// Structure to hold our configuration options, whether from a
/// configuration file or the command line.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct SockscConfig {
    /// Whether to log at trace level.
    trace: bool,
    /// How long to wait for each proxy, in seconds.
    timeout_secs: u64,
    /// What to do with the timeout after a BIND is granted.
    bound_timeout: String,
    /// Whether to shuffle the proxies of a chain.
    randomize: bool,
    /// The proxies we know about.
    proxy: Vec<ProxyConfig>,
}

/// One proxy, as written in the configuration.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProxyConfig {
    /// IP address of the proxy.
    address: String,
    /// TCP port of the proxy.
    port: u16,
    /// SOCKS version: 4 or 5.
    version: u8,
    /// User ID to send.  (For SOCKS5, only used with a password.)
    user_id: Option<String>,
    /// Password to send, SOCKS5 only.
    password: Option<String>,
}

impl ProxyConfig {
    /// Convert this into a descriptor for the client library.
    ///
    /// The library checks the result; we don't.
    fn descriptor(&self) -> ProxyDescriptor {
        let proxy = ProxyDescriptor::new(self.address.clone(), self.port, self.version);
        match (&self.user_id, &self.password) {
            (Some(u), Some(p)) => proxy.with_credentials(u.clone(), p.clone()),
            (Some(u), None) if self.version == 4 => proxy.with_credentials(u.clone(), ""),
            (_, _) => proxy,
        }
    }
}

impl SockscConfig {
    /// Return true if we should log at trace level.
    pub(crate) fn trace(&self) -> bool {
        self.trace
    }

    /// Return the handshake timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Return the policy for the timeout after a BIND is granted.
    fn bound_timeout(&self) -> Result<BoundTimeout> {
        match self.bound_timeout.as_str() {
            "cancel" => Ok(BoundTimeout::Cancel),
            "keep" => Ok(BoundTimeout::Keep),
            "rearm" => Ok(BoundTimeout::Rearm),
            other => Err(anyhow!(
                "bound_timeout must be \"cancel\", \"keep\", or \"rearm\", not {:?}",
                other
            )),
        }
    }

    /// Return options for sending `command` to `destination` through
    /// the first configured proxy.
    pub(crate) fn options(
        &self,
        command: SocksCmd,
        destination: RemoteHost,
    ) -> Result<SocksClientOptions> {
        let proxy = self
            .proxy
            .first()
            .ok_or_else(|| anyhow!("No proxies are configured"))?;
        Ok(SocksClientOptions::new(destination, proxy.descriptor())
            .with_command(command)
            .with_timeout(self.timeout())
            .with_bound_timeout(self.bound_timeout()?))
    }

    /// Return options for a chain to `destination` through every
    /// configured proxy.
    pub(crate) fn chain(&self, destination: RemoteHost) -> ChainOptions {
        let proxies = self.proxy.iter().map(ProxyConfig::descriptor).collect();
        ChainOptions::new(destination, proxies)
            .with_randomize(self.randomize)
            .with_timeout(self.timeout())
    }
}

/// Load our configuration from the defaults, the files in `files`, and
/// the toml lines in `opts`.
///
/// If `files` is empty, and `default_path` is given, that file is read
/// if it exists.
pub(crate) fn load<P: AsRef<Path>>(
    default_path: Option<PathBuf>,
    files: &[P],
    opts: &[String],
) -> Result<SockscConfig> {
    let mut cfg = config::Config::new();
    cfg.merge(config::File::from_str(
        SOCKSC_DEFAULTS,
        config::FileFormat::Toml,
    ))?;

    let mut search_path: Vec<&Path> = files.iter().map(AsRef::as_ref).collect();
    let missing_ok = search_path.is_empty();
    if let Some(p) = &default_path {
        if missing_ok {
            tracing::debug!("Looking for default configuration in {:?}", p);
            search_path.push(p);
        }
    }
    for p in search_path {
        let f: config::File<_> = p.into();
        cfg.merge(f.format(config::FileFormat::Toml).required(!missing_ok))?;
    }

    let mut cmdline = CmdLine::new();
    for opt in opts {
        cmdline.push(opt.as_str());
    }
    cfg.merge(cmdline)?;

    Ok(cfg.try_into()?)
}

/// Return a filename for the default user configuration file.
pub(crate) fn default_config_file() -> Option<PathBuf> {
    let pd = directories::ProjectDirs::from("net", "socks-client", "socksc")?;

    Some(pd.config_dir().join("socksc.toml"))
}

#[cfg(test)]
mod test {
    use super::*;

    /// Load the defaults, plus `opts`.
    fn load_opts(opts: &[&str]) -> Result<SockscConfig> {
        let opts: Vec<String> = opts.iter().map(|s| s.to_string()).collect();
        load::<&str>(None, &[], &opts)
    }

    #[test]
    fn load_default_config() -> Result<()> {
        let cfg = load_opts(&[])?;
        assert!(!cfg.trace());
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.bound_timeout()?, BoundTimeout::Cancel);

        let options = cfg.options(SocksCmd::CONNECT, RemoteHost::new("example.com", 80))?;
        assert_eq!(options.proxy().remote_host(), RemoteHost::new("127.0.0.1", 1080));
        assert_eq!(options.proxy().version, 5);
        assert!(options.proxy().credentials.is_none());
        assert_eq!(options.bound_timeout(), BoundTimeout::Cancel);
        Ok(())
    }

    #[test]
    fn overrides() -> Result<()> {
        let cfg = load_opts(&[
            "trace=true",
            "timeout_secs=5",
            "bound_timeout=rearm",
            "randomize=true",
            r#"proxy=[{address="192.0.2.1", port=1080, version=5, user_id="u", password="p"},
                      {address="192.0.2.2", port=9050, version=4, user_id="bob"}]"#,
        ])?;
        assert!(cfg.trace());

        let options = cfg.options(SocksCmd::BIND, RemoteHost::new("0.0.0.0", 0))?;
        assert_eq!(options.timeout(), Duration::from_secs(5));
        assert_eq!(options.bound_timeout(), BoundTimeout::Rearm);
        assert_eq!(options.command(), SocksCmd::BIND);
        let creds = options.proxy().credentials.as_ref().unwrap();
        assert_eq!(creds.user_id, "u");
        assert_eq!(creds.password, "p");

        let chain = cfg.chain(RemoteHost::new("example.com", 80));
        assert!(chain.randomize());
        assert_eq!(chain.proxies().len(), 2);
        let second = &chain.proxies()[1];
        assert_eq!(second.version, 4);
        assert_eq!(second.credentials.as_ref().unwrap().user_id, "bob");
        assert!(chain.validate().is_ok());
        Ok(())
    }

    #[test]
    fn bad_config() {
        assert!(load_opts(&["no_such_option=1"]).is_err());
        assert!(load_opts(&["timeout_secs=[3"]).is_err());
        assert!(load_opts(&["proxy=[{address=\"10.0.0.1\", port=1080}]"]).is_err());

        let cfg = load_opts(&["bound_timeout=forever"]).unwrap();
        assert!(cfg
            .options(SocksCmd::BIND, RemoteHost::new("0.0.0.0", 0))
            .is_err());

        let cfg = load_opts(&["proxy=[]"]).unwrap();
        assert!(cfg
            .options(SocksCmd::CONNECT, RemoteHost::new("example.com", 80))
            .is_err());
    }

    #[test]
    fn missing_files() {
        // A missing file that was asked for is an error...
        assert!(load(None, &["/nonexistent/socksc.toml"], &[]).is_err());
        // ...but a missing default file is not.
        let dflt = PathBuf::from("/nonexistent/socksc.toml");
        assert!(load::<&str>(Some(dflt), &[], &[]).is_ok());
    }
}
