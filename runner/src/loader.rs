//! Library loading and symbol resolution behind a small trait seam.
//!
//! [`DlLoader`] is the real implementation over `libloading`. It is the only
//! place an untyped symbol address is bound to [`LaunchFn`]. Tests substitute
//! their own loader to drive each exit path of a probe.

use crate::binding::LaunchFn;
use crate::cf::CfOwned;
use crate::error::ProbeError;

pub trait ServiceLoader {
    type Library: ServiceLibrary;

    fn load(&self, path: &str) -> Result<Self::Library, ProbeError>;
}

/// An open library handle. `close` consumes the handle, so it runs at most
/// once, and no resolved entry can outlive it.
pub trait ServiceLibrary {
    type Entry<'lib>: LaunchEntry
    where
        Self: 'lib;

    fn resolve(&self, symbol: &str) -> Result<Self::Entry<'_>, ProbeError>;

    fn close(self) -> Result<(), ProbeError>;
}

pub trait LaunchEntry {
    /// Calls the entry point for `target_id` and returns its raw status code.
    fn launch(&self, target_id: &str) -> Result<i32, ProbeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DlLoader;

pub struct DlLibrary {
    library: libloading::Library,
}

pub struct DlEntry<'lib> {
    launch: libloading::Symbol<'lib, LaunchFn>,
}

impl ServiceLoader for DlLoader {
    type Library = DlLibrary;

    fn load(&self, path: &str) -> Result<DlLibrary, ProbeError> {
        use libloading::os::unix::{Library, RTLD_NOW};

        // SAFETY: loading runs the library's initializers; the bindings only
        // name system libraries.
        let library = unsafe { Library::open(Some(path), RTLD_NOW) }.map_err(|err| {
            ProbeError::Load {
                path: path.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(DlLibrary {
            library: library.into(),
        })
    }
}

impl ServiceLibrary for DlLibrary {
    type Entry<'lib> = DlEntry<'lib>;

    fn resolve(&self, symbol: &str) -> Result<DlEntry<'_>, ProbeError> {
        // SAFETY: the symbol is typed as LaunchFn, the signature declared for
        // this binding. A wrong declaration is a fault we cannot detect here.
        let launch = unsafe { self.library.get::<LaunchFn>(symbol.as_bytes()) }.map_err(|err| {
            ProbeError::Resolve {
                symbol: symbol.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(DlEntry { launch })
    }

    fn close(self) -> Result<(), ProbeError> {
        self.library.close().map_err(|err| ProbeError::Release {
            reason: err.to_string(),
        })
    }
}

impl LaunchEntry for DlEntry<'_> {
    fn launch(&self, target_id: &str) -> Result<i32, ProbeError> {
        let identifier = CfOwned::string(target_id)?;
        let params = CfOwned::empty_dictionary()?;
        let options = CfOwned::empty_dictionary()?;
        // SAFETY: all arguments are live CF objects (url is the permitted NULL)
        // and outlive the call.
        let code = unsafe {
            (*self.launch)(
                identifier.as_ptr(),
                std::ptr::null(),
                params.as_ptr(),
                options.as_ptr(),
            )
        };
        Ok(code)
    }
}
