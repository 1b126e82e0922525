use std::path::Path;
use std::path::PathBuf;

use smc_path::path_from_utf8_name;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::PackageError;
use crate::lookup::find_reading_path;
use crate::lookup::find_relative_path;
use crate::package::PackageInfo;
use crate::registry::Registry;
use crate::registry::SkippedPackage;
use crate::roots::ResourceRoots;
use crate::search_path::build_search_path;

pub const PIXMAPS_DIR: &str = "pixmaps";
pub const SOUNDS_DIR: &str = "sounds";
pub const MUSIC_DIR: &str = "music";
pub const LEVELS_DIR: &str = "levels";
pub const CAMPAIGNS_DIR: &str = "campaigns";
pub const WORLDS_DIR: &str = "worlds";

/// Companion file describing how an image is used.
pub const SETTINGS_EXTENSION: &str = "settings";
pub const LEVEL_EXTENSION: &str = "smclvl";

/// Installed packages, the selected one and the search path
/// derived from it.
#[ derive( Debug ) ]
pub struct PackageManager {
    roots: ResourceRoots,
    registry: Registry,
    current: Option<String>,
    search_path: Vec<PathBuf>,
}

impl PackageManager {
    /// Scan packages, nothing selected.
    #[ tracing::instrument( name = "PackageManager::new" ) ]
    pub fn new( roots: ResourceRoots ) -> Self {
        info!( "Initializing package manager" );
        let registry = Registry::scan( &roots );
        let search_path = build_search_path(
            &registry, None, &roots.user_data, &roots.game_data
        );
        Self { roots, registry, current: None, search_path }
    }

    /// Scan again, keeping the selection if the package is still there.
    #[ tracing::instrument( skip_all ) ]
    pub fn rescan( &mut self ) {
        self.registry = Registry::scan( &self.roots );
        if let Some( current ) = &self.current
            && !self.registry.contains( current )
        {
            warn!( "Current package {current} is gone, deselecting" );
            self.current = None;
        }
        self.rebuild_search_path();
    }

    pub fn roots( &self ) -> &ResourceRoots {
        &self.roots
    }

    pub fn registry( &self ) -> &Registry {
        &self.registry
    }

    /// All packages sorted by name.
    pub fn packages( &self ) -> Vec<&PackageInfo> {
        self.registry.list()
    }

    /// Packages meant to be shown to players.
    pub fn visible_packages( &self ) -> Vec<&PackageInfo> {
        self.registry.visible()
    }

    pub fn package( &self, name: &str ) -> Option<&PackageInfo> {
        self.registry.get( name )
    }

    pub fn skipped( &self ) -> &[SkippedPackage] {
        self.registry.skipped()
    }

    pub fn current_package( &self ) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn search_path( &self ) -> &[PathBuf] {
        &self.search_path
    }

    /// Select a package, or none.
    ///
    /// An unknown name selects none. The search path is rebuilt and
    /// the user directories of the selection are created.
    ///
    /// # Errors
    ///
    /// When creating one of the user directories fails.
    #[ tracing::instrument( skip( self ) ) ]
    pub fn set_current_package( &mut self, name: Option<&str> )
        -> Result<(), PackageError>
    {
        self.select_package( name );
        self.init_user_paths()
    }

    /// Like [`Self::set_current_package`] but leaves the disk alone.
    /// Returns whether `name` was known, `None` counts as known.
    pub fn select_package( &mut self, name: Option<&str> ) -> bool {
        let known = match name {
            Some( name ) if self.registry.contains( name ) => {
                info!( "Selecting package {name}" );
                self.current = Some( name.to_owned() );
                true
            },
            Some( name ) => {
                warn!( "Unknown package {name}, selecting none" );
                self.current = None;
                false
            },
            None => {
                self.current = None;
                true
            },
        };
        self.rebuild_search_path();
        known
    }

    fn rebuild_search_path( &mut self ) {
        self.search_path = build_search_path(
            &self.registry,
            self.current.as_deref(),
            &self.roots.user_data,
            &self.roots.game_data,
        );
    }

    /// Create the user-writable directories of the current selection.
    ///
    /// # Errors
    ///
    /// When a directory can't be created.
    #[ tracing::instrument( skip( self ) ) ]
    pub fn init_user_paths( &self ) -> Result<(), PackageError> {
        let dirs = [
            self.user_level_path(),
            self.user_campaign_path(),
            self.user_world_path(),
            Some( self.user_savegame_path() ),
            Some( self.user_screenshot_path() ),
        ];
        for dir in dirs.into_iter().flatten() {
            if dir.is_dir() {
                continue
            }
            debug!( ?dir, "create user directory" );
            std::fs::create_dir_all( &dir )
                .map_err( PackageError::io( &dir ) )?;
        }
        Ok(())
    }

    /// User directory of the `pos`-th package in the search path,
    /// where the position past the last package is the user root.
    pub fn user_data_path( &self, pos: usize ) -> Option<&Path> {
        self.search_path.get( 2 * pos ).map( PathBuf::as_path )
    }

    /// Like [`Self::user_data_path`] for game directories.
    pub fn game_data_path( &self, pos: usize ) -> Option<&Path> {
        self.search_path.get( 2 * pos + 1 ).map( PathBuf::as_path )
    }

    pub fn user_level_path( &self ) -> Option<PathBuf> {
        self.user_data_path( 0 ).map( |it| it.join( LEVELS_DIR ) )
    }

    pub fn game_level_path( &self ) -> Option<PathBuf> {
        self.game_data_path( 0 ).map( |it| it.join( LEVELS_DIR ) )
    }

    pub fn user_campaign_path( &self ) -> Option<PathBuf> {
        self.user_data_path( 0 ).map( |it| it.join( CAMPAIGNS_DIR ) )
    }

    pub fn game_campaign_path( &self ) -> Option<PathBuf> {
        self.game_data_path( 0 ).map( |it| it.join( CAMPAIGNS_DIR ) )
    }

    pub fn user_world_path( &self ) -> Option<PathBuf> {
        self.user_data_path( 0 ).map( |it| it.join( WORLDS_DIR ) )
    }

    pub fn game_world_path( &self ) -> Option<PathBuf> {
        self.game_data_path( 0 ).map( |it| it.join( WORLDS_DIR ) )
    }

    /// Savegames are kept apart per package.
    pub fn user_savegame_path( &self ) -> PathBuf {
        self.per_package( &self.roots.user_savegame )
    }

    pub fn user_screenshot_path( &self ) -> PathBuf {
        self.per_package( &self.roots.user_screenshot )
    }

    fn per_package( &self, base: &Path ) -> PathBuf {
        match &self.current {
            Some( name ) => base.join( path_from_utf8_name( name ) ),
            None => base.to_owned(),
        }
    }

    /// See [`find_reading_path`].
    pub fn find_reading_path<S>( &self, dir: &str, resource: &str, extra_ext: &[S] )
        -> Option<PathBuf>
    where
        S: AsRef<str> + std::fmt::Debug
    {
        find_reading_path(
            &self.search_path,
            Path::new( dir ),
            Path::new( resource ),
            extra_ext,
        )
    }

    /// See [`find_relative_path`].
    pub fn find_relative_path( &self, dir: &str, path: &Path ) -> Option<PathBuf> {
        find_relative_path( &self.search_path, Path::new( dir ), path )
    }

    /// An image, or its `.settings` companion when `use_settings`.
    pub fn pixmap_reading_path( &self, pixmap: &str, use_settings: bool )
        -> Option<PathBuf>
    {
        let ext: &[&str] = if use_settings { &[ SETTINGS_EXTENSION ] } else { &[] };
        self.find_reading_path( PIXMAPS_DIR, pixmap, ext )
    }

    pub fn sound_reading_path( &self, sound: &str ) -> Option<PathBuf> {
        self.find_reading_path::<&str>( SOUNDS_DIR, sound, &[] )
    }

    pub fn music_reading_path( &self, music: &str ) -> Option<PathBuf> {
        self.find_reading_path::<&str>( MUSIC_DIR, music, &[] )
    }

    /// Levels may be referred to with or without their extension.
    pub fn level_reading_path( &self, level: &str ) -> Option<PathBuf> {
        self.find_reading_path( LEVELS_DIR, level, &[ LEVEL_EXTENSION ] )
    }

    pub fn relative_pixmap_path( &self, path: &Path ) -> Option<PathBuf> {
        self.find_relative_path( PIXMAPS_DIR, path )
    }

    pub fn relative_sound_path( &self, path: &Path ) -> Option<PathBuf> {
        self.find_relative_path( SOUNDS_DIR, path )
    }

    pub fn relative_music_path( &self, path: &Path ) -> Option<PathBuf> {
        self.find_relative_path( MUSIC_DIR, path )
    }
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
mod test {

    use super::*;

    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    struct Setup {
        user: TempDir,
        game: TempDir,
    }

    impl Setup {
        /// `forest` uses `common`, `common` uses `forest`,
        /// `hidden` is hidden.
        fn new() -> Self {
            let user = TempDir::new().unwrap();
            let game = TempDir::new().unwrap();

            game.child( "packages/forest.smcpkg/package.xml" )
                .write_str( r#"<package>
                    <settings><property name="description" value="Trees" /></settings>
                    <use><property name="package" value="common" /></use>
                </package>"# )
                .unwrap();
            game.child( "packages/common.smcpkg/package.xml" )
                .write_str( r#"<package>
                    <use><property name="package" value="forest" /></use>
                </package>"# )
                .unwrap();
            game.child( "packages/hidden.smcpkg/package.xml" )
                .write_str( r#"<Package><Settings>
                    <Property Name="hidden" Value="1" />
                </Settings></Package>"# )
                .unwrap();

            Self { user, game }
        }

        fn roots( &self ) -> ResourceRoots {
            ResourceRoots::with_defaults(
                self.user.path().to_owned(),
                self.game.path().to_owned(),
            )
        }

        fn manager( &self ) -> PackageManager {
            PackageManager::new( self.roots() )
        }

        fn pkg( &self, root: &TempDir, name: &str ) -> PathBuf {
            root.path().join( format!( "packages/{name}.smcpkg" ) )
        }
    }

    #[ test ]
    fn starts_without_package() {
        let s = Setup::new();
        let m = s.manager();

        assert_eq!( m.current_package(), None );
        assert_eq!( m.search_path(), [ s.user.path(), s.game.path() ] );
        assert_eq!(
            m.packages().into_iter().map( PackageInfo::name ).collect::<Vec<_>>(),
            [ "common", "forest", "hidden" ]
        );
        assert_eq!( m.visible_packages().len(), 2 );
        assert_eq!( m.package( "forest" ).unwrap().desc(), "Trees" );
    }

    #[ test ]
    fn select_package_with_cycle() {
        let s = Setup::new();
        let mut m = s.manager();

        m.set_current_package( Some( "forest" ) ).unwrap();

        assert_eq!( m.current_package(), Some( "forest" ) );
        assert_eq!( m.search_path(), [
            s.pkg( &s.user, "forest" ),
            s.pkg( &s.game, "forest" ),
            s.pkg( &s.user, "common" ),
            s.pkg( &s.game, "common" ),
            s.user.path().to_owned(),
            s.game.path().to_owned(),
        ] );
        assert_eq!( m.user_data_path( 1 ), Some( s.pkg( &s.user, "common" ).as_path() ) );
        assert_eq!( m.game_data_path( 2 ), Some( s.game.path() ) );
        assert_eq!( m.game_data_path( 3 ), None );
    }

    #[ test ]
    fn unknown_selection_resets() {
        let s = Setup::new();
        let mut m = s.manager();

        m.set_current_package( Some( "forest" ) ).unwrap();
        m.set_current_package( Some( "nope" ) ).unwrap();

        assert_eq!( m.current_package(), None );
        assert_eq!( m.search_path(), [ s.user.path(), s.game.path() ] );
    }

    #[ test ]
    fn select_without_touching_disk() {
        let s = Setup::new();
        let mut m = s.manager();

        assert!( m.select_package( Some( "forest" ) ) );
        assert_eq!( m.search_path().len(), 6 );
        assert!( !s.pkg( &s.user, "forest" ).exists() );

        assert!( !m.select_package( Some( "nope" ) ) );
        assert_eq!( m.current_package(), None );
        assert!( m.select_package( None ) );
    }

    #[ test ]
    fn selection_creates_user_dirs() {
        let s = Setup::new();
        let mut m = s.manager();

        m.set_current_package( Some( "forest" ) ).unwrap();

        let user_pkg = s.pkg( &s.user, "forest" );
        for dir in [ "levels", "campaigns", "worlds" ] {
            assert!( user_pkg.join( dir ).is_dir(), "{dir}" );
        }
        assert_eq!(
            m.user_savegame_path(),
            s.user.path().join( "savegames/forest" )
        );
        assert!( m.user_savegame_path().is_dir() );
        assert!( s.user.path().join( "screenshots/forest" ).is_dir() );

        assert_eq!( m.user_level_path(), Some( user_pkg.join( "levels" ) ) );
        assert_eq!(
            m.game_world_path(),
            Some( s.pkg( &s.game, "forest" ).join( "worlds" ) )
        );
    }

    #[ test ]
    fn no_selection_paths() {
        let s = Setup::new();
        let mut m = s.manager();

        m.set_current_package( None ).unwrap();

        assert_eq!( m.user_savegame_path(), s.user.path().join( "savegames" ) );
        assert_eq!(
            m.user_screenshot_path(),
            s.user.path().join( "screenshots" )
        );
        assert!( s.user.path().join( "levels" ).is_dir() );
        assert_eq!(
            m.game_campaign_path(),
            Some( s.game.path().join( "campaigns" ) )
        );
    }

    #[ test ]
    fn resources_resolve_through_layers() {
        let s = Setup::new();

        s.game.child( "pixmaps/ground.png" ).touch().unwrap();
        s.game.child( "packages/common.smcpkg/pixmaps/ground.settings" )
            .touch().unwrap();
        s.user.child( "packages/forest.smcpkg/sounds/bird.ogg" )
            .touch().unwrap();
        s.game.child( "music/theme.ogg" ).touch().unwrap();
        s.game.child( "packages/forest.smcpkg/levels/lake.smclvl" )
            .touch().unwrap();

        let mut m = s.manager();
        m.set_current_package( Some( "forest" ) ).unwrap();

        assert_eq!(
            m.pixmap_reading_path( "ground.png", true ),
            Some( s.pkg( &s.game, "common" ).join( "pixmaps/ground.settings" ) )
        );
        assert_eq!(
            m.pixmap_reading_path( "ground.png", false ),
            Some( s.game.path().join( "pixmaps/ground.png" ) )
        );
        assert_eq!(
            m.sound_reading_path( "bird.ogg" ),
            Some( s.pkg( &s.user, "forest" ).join( "sounds/bird.ogg" ) )
        );
        assert_eq!(
            m.music_reading_path( "theme.ogg" ),
            Some( s.game.path().join( "music/theme.ogg" ) )
        );
        assert_eq!(
            m.level_reading_path( "lake" ),
            Some( s.pkg( &s.game, "forest" ).join( "levels/lake.smclvl" ) )
        );
        assert_eq!( m.music_reading_path( "missing.ogg" ), None );

        m.set_current_package( None ).unwrap();
        assert_eq!( m.sound_reading_path( "bird.ogg" ), None );
    }

    #[ test ]
    fn relative_paths() {
        let s = Setup::new();
        let mut m = s.manager();
        m.set_current_package( Some( "forest" ) ).unwrap();

        let in_package = s.pkg( &s.game, "common" ).join( "pixmaps/tree/oak.png" );
        assert_eq!(
            m.relative_pixmap_path( &in_package ),
            Some( PathBuf::from( "tree/oak.png" ) )
        );
        assert_eq!(
            m.relative_sound_path( &s.user.path().join( "sounds/a.ogg" ) ),
            Some( PathBuf::from( "a.ogg" ) )
        );
        assert_eq!(
            m.relative_music_path( Path::new( "/nowhere/music/a.ogg" ) ),
            None
        );
    }

    #[ test ]
    fn rescan_drops_vanished_selection() {
        let s = Setup::new();
        let mut m = s.manager();
        m.set_current_package( Some( "hidden" ) ).unwrap();

        // selecting created the user side too
        std::fs::remove_dir_all( s.pkg( &s.user, "hidden" ) ).unwrap();
        std::fs::remove_dir_all( s.pkg( &s.game, "hidden" ) ).unwrap();
        m.rescan();

        assert_eq!( m.current_package(), None );
        assert!( m.package( "hidden" ).is_none() );
        assert_eq!( m.search_path(), [ s.user.path(), s.game.path() ] );
    }

    #[ test ]
    fn rescan_keeps_selection() {
        let s = Setup::new();
        let mut m = s.manager();
        m.set_current_package( Some( "forest" ) ).unwrap();

        s.game.child( "packages/extra.smcpkg" ).create_dir_all().unwrap();
        m.rescan();

        assert_eq!( m.current_package(), Some( "forest" ) );
        assert!( m.package( "extra" ).is_some() );
        assert_eq!( m.search_path().len(), 6 );
    }

}
