//! Plugin boundary between the host and compiled modules
//!
//! A module is a `cdylib` that links `arcade_host` and exports one static
//! [`ModuleDeclaration`] under [`ENTRY_SYMBOL`], normally via
//! [`declare_module!`](crate::declare_module). The loader resolves that
//! symbol, checks the declaration against the host, and calls `create`.
//!
//! ```rust,ignore
//! use arcade_host::{declare_module, GameModule};
//!
//! #[derive(Default)]
//! pub struct ModuleEntry;
//!
//! impl GameModule for ModuleEntry { /* ... */ }
//!
//! declare_module!(ModuleEntry, ModuleEntry::default);
//! ```

use thiserror::Error;

use crate::module::traits::GameModule;

/// Version of the declaration layout and the `GameModule` vtable contract
pub const ABI_VERSION: u32 = 1;

/// Compiler that built this copy of the host API
pub const RUSTC_VERSION: &str = env!("ARCADE_RUSTC_VERSION");

/// Host API version baked into every declaration
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exported symbol name (NUL-terminated for symbol lookup)
pub const ENTRY_SYMBOL: &[u8] = b"arcade_module_declaration\0";

/// Static declaration exported by every module artifact
#[derive(Clone, Copy)]
#[repr(C)]
pub struct ModuleDeclaration {
    pub abi_version: u32,
    pub rustc_version: &'static str,
    pub host_version: &'static str,
    /// No-argument constructor of the entry type
    pub create: fn() -> Box<dyn GameModule>,
}

impl std::fmt::Debug for ModuleDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDeclaration")
            .field("abi_version", &self.abi_version)
            .field("rustc_version", &self.rustc_version)
            .field("host_version", &self.host_version)
            .finish()
    }
}

/// Reasons a declaration does not satisfy the host contract
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Incompatibility {
    #[error("ABI version {found} (host expects {expected})")]
    AbiVersion { expected: u32, found: u32 },

    #[error("built with `{found}` (host built with `{expected}`)")]
    Compiler { expected: String, found: String },

    #[error("host API {found} not compatible with host {expected}")]
    HostVersion { expected: String, found: String },
}

impl ModuleDeclaration {
    /// Structural check of the declaration against this host
    pub fn check_compatible(&self) -> Result<(), Incompatibility> {
        self.check_against(ABI_VERSION, RUSTC_VERSION, HOST_VERSION)
    }

    pub(crate) fn check_against(
        &self,
        abi_version: u32,
        rustc_version: &str,
        host_version: &str,
    ) -> Result<(), Incompatibility> {
        if self.abi_version != abi_version {
            return Err(Incompatibility::AbiVersion {
                expected: abi_version,
                found: self.abi_version,
            });
        }
        if self.rustc_version != rustc_version {
            return Err(Incompatibility::Compiler {
                expected: rustc_version.to_string(),
                found: self.rustc_version.to_string(),
            });
        }
        if major_minor(self.host_version) != major_minor(host_version) {
            return Err(Incompatibility::HostVersion {
                expected: host_version.to_string(),
                found: self.host_version.to_string(),
            });
        }
        Ok(())
    }
}

/// `"1.4.2-beta"` -> `Some(("1", "4"))`
fn major_minor(version: &str) -> Option<(&str, &str)> {
    let mut parts = version.split(['.', '-', '+']);
    let major = parts.next().filter(|p| !p.is_empty())?;
    let minor = parts.next().filter(|p| !p.is_empty())?;
    Some((major, minor))
}

/// Export a module entry type from a `cdylib`
///
/// `$ctor` is the entry type's no-argument constructor.
#[macro_export]
macro_rules! declare_module {
    ($entry:ty, $ctor:path) => {
        #[doc(hidden)]
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static arcade_module_declaration: $crate::module::abi::ModuleDeclaration =
            $crate::module::abi::ModuleDeclaration {
                abi_version: $crate::module::abi::ABI_VERSION,
                rustc_version: $crate::module::abi::RUSTC_VERSION,
                host_version: $crate::module::abi::HOST_VERSION,
                create: {
                    fn __arcade_create() -> ::std::boxed::Box<dyn $crate::module::traits::GameModule> {
                        let entry: $entry = $ctor();
                        ::std::boxed::Box::new(entry)
                    }
                    __arcade_create
                },
            };
    };
}
