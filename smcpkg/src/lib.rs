//! Packages for the SMC engine.
//!
//! A package is a directory `<root>/packages/<name>.smcpkg` below the
//! user data root or the game data root, mirroring the layout of the
//! data roots themselves (`pixmaps`, `sounds`, `music`, `levels`, ...).
//! Packages may use other packages, and selecting one layers its
//! directories, and those of everything it uses, over the base data.
//!
//! [`PackageManager`] is the entry point:
//!
//! ```no_run
//! use smcpkg::PackageManager;
//! use smcpkg::ResourceRoots;
//!
//! let roots = ResourceRoots::with_defaults(
//!     "/home/me/.local/share/smc".into(),
//!     "/usr/share/smc".into(),
//! );
//! let mut manager = PackageManager::new( roots );
//! manager.set_current_package( Some( "forest" ) )?;
//! let grass = manager.pixmap_reading_path( "ground/grass.png", true );
//! # Ok::<(), smcpkg::PackageError>(())
//! ```

pub mod descriptor;
pub mod error;
pub mod lookup;
pub mod manager;
pub mod package;
pub mod registry;
pub mod roots;
pub mod search_path;

pub use error::PackageError;
pub use manager::PackageManager;
pub use package::PackageInfo;
pub use registry::Registry;
pub use roots::ResourceRoots;
