//! The four directories the package manager builds everything from.

use std::path::PathBuf;

/// Name of the directory under each data root holding packages.
pub const PACKAGES_DIR: &str = "packages";

/// Absolute locations provided by the engine's resource manager.
#[ derive( Debug, Clone, PartialEq, Eq ) ]
pub struct ResourceRoots {
    /// User-writable profile directory.
    pub user_data: PathBuf,
    /// Installed, read-only game data.
    pub game_data: PathBuf,
    pub user_savegame: PathBuf,
    pub user_screenshot: PathBuf,
}

impl ResourceRoots {
    /// Roots where savegames and screenshots live under the user data
    /// directory, which is how the engine lays out a fresh profile.
    #[ must_use ]
    pub fn with_defaults( user_data: PathBuf, game_data: PathBuf ) -> Self {
        Self {
            user_savegame: user_data.join( "savegames" ),
            user_screenshot: user_data.join( "screenshots" ),
            user_data,
            game_data,
        }
    }

    #[ must_use ]
    pub fn user_packages( &self ) -> PathBuf {
        self.user_data.join( PACKAGES_DIR )
    }

    #[ must_use ]
    pub fn game_packages( &self ) -> PathBuf {
        self.game_data.join( PACKAGES_DIR )
    }
}

#[ cfg( test ) ]
mod test {

    use super::*;
    use std::path::Path;

    #[ test ]
    fn default_layout() {
        let roots = ResourceRoots::with_defaults(
            "/home/u/.local/share/smc".into(),
            "/usr/share/smc".into(),
        );
        assert_eq!(
            roots.user_savegame,
            Path::new( "/home/u/.local/share/smc/savegames" )
        );
        assert_eq!(
            roots.user_screenshot,
            Path::new( "/home/u/.local/share/smc/screenshots" )
        );
        assert_eq!(
            roots.game_packages(),
            Path::new( "/usr/share/smc/packages" )
        );
    }

}
