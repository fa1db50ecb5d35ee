//! Getting a tokio-backed [`Runtime`](crate::Runtime).
pub use crate::impls::tokio::TokioRuntimeHandle;

use crate::SpawnBlocking;

use std::io::{Error as IoError, ErrorKind};

/// Build a multithreaded tokio runtime, and return a
/// [`Runtime`](crate::Runtime) handle that owns it.
///
/// Clones of the handle share the runtime.
pub fn create_runtime() -> std::io::Result<TokioRuntimeHandle> {
    crate::impls::tokio::create_runtime()
}

/// Return a handle to the tokio runtime we're running inside.
///
/// Fails when called from outside tokio.
pub fn current_runtime() -> std::io::Result<TokioRuntimeHandle> {
    let handle = tokio_crate::runtime::Handle::try_current()
        .map_err(|e| IoError::new(ErrorKind::Other, e))?;
    Ok(TokioRuntimeHandle::new(handle))
}

/// Build a fresh runtime, and block on whatever future `func` makes
/// from it.
///
/// # Panics
///
/// Panics if no tokio runtime can be created.
pub fn test_with_runtime<P, F, O>(func: P) -> O
where
    P: FnOnce(TokioRuntimeHandle) -> F,
    F: futures::Future<Output = O>,
{
    let runtime = create_runtime().expect("Couldn't create a tokio runtime");
    runtime.block_on(func(runtime.clone()))
}
