//! Discovery of installed packages.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use smc_path::PathExt;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;
use walkdir::DirEntry;
use walkdir::WalkDir;

use crate::error::PackageError;
use crate::package::load_package_info;
use crate::package::PackageInfo;
use crate::package::PACKAGE_EXTENSION;
use crate::roots::ResourceRoots;

/// Whether a directory entry is a package, going by its extension.
#[ must_use ]
pub fn is_package_archive( entry: &Path ) -> bool {
    entry.has_extension( PACKAGE_EXTENSION )
}

/// A package which was found on disk but couldn't be loaded.
#[ derive( Debug ) ]
pub struct SkippedPackage {
    pub name: String,
    pub error: PackageError,
}

/// Result of walking both `packages` roots.
#[ derive( Debug, Default ) ]
pub struct ScanOutcome {
    pub packages: BTreeMap<String, PackageInfo>,
    pub skipped: Vec<SkippedPackage>,
}

/// Walk the user `packages` root then the game `packages` root.
///
/// Entries matching `is_archive` are packages, named after their path
/// relative to the `packages` root without the extension. Other
/// directories are namespaces and get descended into, symlinks
/// included. Symlink loops are reported and cut.
///
/// The first root to provide a name wins, and its entry on disk
/// decides the package directories in both roots. Packages with a
/// broken descriptor end up in [`ScanOutcome::skipped`].
#[ tracing::instrument( skip( is_archive ) ) ]
pub fn scan_packages<F>( roots: &ResourceRoots, is_archive: F ) -> ScanOutcome
where
    F: Fn( &Path ) -> bool
{
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for base in [ roots.user_packages(), roots.game_packages() ] {
        let entries = collect_entries( &base, &is_archive );
        debug!( ?base, ?entries, "packages under root" );
        for ( name, entry ) in entries {
            if seen.insert( name.clone() ) {
                found.push( ( name, entry ) );
            } else {
                debug!( name, "already provided by an earlier root" );
            }
        }
    }

    let mut outcome = ScanOutcome::default();

    for ( name, entry ) in found {
        match load_package_info( &name, &entry, roots ) {
            Ok( info ) => {
                info!( "Found package {name}" );
                outcome.packages.insert( name, info );
            },
            Err( error ) => {
                warn!( "Skipping package {name}: {error}" );
                outcome.skipped.push( SkippedPackage { name, error } );
            },
        }
    }

    outcome
}

/// Package names under `base` together with their entry relative
/// to `base`, in file name order.
fn collect_entries<F>( base: &Path, is_archive: &F ) -> Vec<( String, PathBuf )>
where
    F: Fn( &Path ) -> bool
{
    let relative = |entry: &DirEntry| entry.path()
        .strip_prefix( base )
        .unwrap_or( entry.path() )
        .to_owned();

    let mut walker = WalkDir::new( base )
        .follow_links( true )
        .min_depth( 1 )
        .sort_by_file_name()
        .into_iter()
        // plain files never matter, don't even yield them
        .filter_entry( |it| it.file_type().is_dir() || is_archive( &relative( it ) ) );

    let mut found = Vec::new();

    while let Some( entry ) = walker.next() {
        let entry = match entry {
            Ok( it ) => it,
            Err( err ) if err.depth() == 0
                && err.io_error().is_some_and( |it| it.kind() == ErrorKind::NotFound ) =>
            {
                debug!( ?base, "no such directory" );
                continue
            },
            Err( err ) => {
                warn!( "Skipping entry under {}: {err}", base.display() );
                continue
            },
        };

        let entry_path = relative( &entry );

        if !is_archive( &entry_path ) {
            trace!( ?entry_path, "namespace" );
            continue
        }

        // the inside of a package is none of our business
        if entry.file_type().is_dir() {
            walker.skip_current_dir();
        }

        match entry_path.without_extension().to_utf8_name() {
            Some( name ) => found.push( ( name, entry_path ) ),
            None => warn!( "Ignoring package with unusable name {}", entry_path.display() ),
        }
    }

    found
}

/// All known packages, by name.
#[ derive( Debug, Default ) ]
pub struct Registry {
    packages: BTreeMap<String, PackageInfo>,
    skipped: Vec<SkippedPackage>,
}

impl Registry {
    /// Scan both roots from scratch.
    #[ must_use ]
    pub fn scan( roots: &ResourceRoots ) -> Self {
        scan_packages( roots, is_package_archive ).into()
    }

    pub fn get( &self, name: &str ) -> Option<&PackageInfo> {
        self.packages.get( name )
    }

    pub fn contains( &self, name: &str ) -> bool {
        self.packages.contains_key( name )
    }

    /// Every package, sorted by name.
    pub fn list( &self ) -> Vec<&PackageInfo> {
        self.packages.values().collect()
    }

    /// Like [`Registry::list`] without hidden packages.
    pub fn visible( &self ) -> Vec<&PackageInfo> {
        self.packages.values()
            .filter( |it| !it.hidden() )
            .collect()
    }

    pub fn skipped( &self ) -> &[SkippedPackage] {
        &self.skipped
    }

    pub fn len( &self ) -> usize {
        self.packages.len()
    }

    pub fn is_empty( &self ) -> bool {
        self.packages.is_empty()
    }

    #[ cfg( test ) ]
    pub( crate ) fn from_packages( packages: Vec<PackageInfo> ) -> Self {
        Self {
            packages: packages.into_iter()
                .map( |it| ( it.name().to_owned(), it ) )
                .collect(),
            skipped: vec![],
        }
    }
}

impl From<ScanOutcome> for Registry {
    fn from( ScanOutcome { packages, skipped }: ScanOutcome ) -> Self {
        Self { packages, skipped }
    }
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
#[ allow( clippy::indexing_slicing ) ]
mod test {

    use super::*;

    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use itertools::Itertools;

    fn describe( dir: &assert_fs::fixture::ChildPath, description: &str ) {
        dir.child( "package.xml" )
            .write_str( &format!(
                r#"<package><settings><property name="description" value="{description}"/></settings></package>"#
            ) )
            .unwrap();
    }

    fn roots( user: &TempDir, game: &TempDir ) -> ResourceRoots {
        ResourceRoots::with_defaults(
            user.path().to_owned(),
            game.path().to_owned(),
        )
    }

    #[ test ]
    fn finds_nested_packages() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/plain.smcpkg" ).create_dir_all().unwrap();
        game.child( "packages/cat/sub/deep.smcpkg" ).create_dir_all().unwrap();
        game.child( "packages/cat/readme.txt" ).touch().unwrap();
        user.child( "packages/mine.smcpkg" ).create_dir_all().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );

        let names = registry.list().into_iter()
            .map( |it| it.name() )
            .collect_vec();
        assert_eq!( names, [ "cat/sub/deep", "mine", "plain" ] );

        for name in names {
            assert_eq!( registry.get( name ).unwrap().name(), name );
        }
        assert!( registry.get( "cat" ).is_none() );
        assert!( registry.get( "cat/readme" ).is_none() );
    }

    #[ test ]
    fn user_root_wins() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        describe( &user.child( "packages/shared.smcpkg" ), "user" );
        describe( &game.child( "packages/shared.smcpkg" ), "game" );

        let registry = Registry::scan( &roots( &user, &game ) );
        assert_eq!( registry.len(), 1 );
        assert_eq!( registry.get( "shared" ).unwrap().desc(), "user" );
    }

    #[ test ]
    fn archive_file_counts_as_package() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/zipped.smcpkg" ).touch().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert!( registry.contains( "zipped" ) );
    }

    #[ test ]
    fn missing_roots_are_empty() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert!( registry.is_empty() );
        assert!( registry.skipped().is_empty() );
    }

    #[ test ]
    fn broken_descriptor_is_skipped() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/bad.smcpkg/package.xml" )
            .write_str( "<package><use>" ).unwrap();
        game.child( "packages/good.smcpkg" ).create_dir_all().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert!( registry.contains( "good" ) );
        assert!( !registry.contains( "bad" ) );
        assert_eq!( registry.skipped().len(), 1 );
        assert_eq!( registry.skipped()[0].name, "bad" );
    }

    #[ test ]
    fn hidden_packages_not_visible() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/secret.smcpkg/package.xml" )
            .write_str( r#"<package><settings><property name="hidden" value="1"/></settings></package>"# )
            .unwrap();
        game.child( "packages/open.smcpkg" ).create_dir_all().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert_eq!( registry.list().len(), 2 );
        let visible = registry.visible().into_iter()
            .map( |it| it.name() )
            .collect_vec();
        assert_eq!( visible, [ "open" ] );
    }

    #[ test ]
    fn rescan_rebuilds() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();
        let roots = roots( &user, &game );

        game.child( "packages/old.smcpkg" ).create_dir_all().unwrap();
        assert!( Registry::scan( &roots ).contains( "old" ) );

        std::fs::remove_dir( game.child( "packages/old.smcpkg" ).path() ).unwrap();
        game.child( "packages/new.smcpkg" ).create_dir_all().unwrap();

        let registry = Registry::scan( &roots );
        assert!( !registry.contains( "old" ) );
        assert!( registry.contains( "new" ) );
    }

    #[ test ]
    fn custom_archive_predicate() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        describe( &game.child( "packages/a.zip" ), "zipped" );
        game.child( "packages/b.smcpkg" ).create_dir_all().unwrap();

        let outcome = scan_packages(
            &roots( &user, &game ),
            |it: &Path| it.has_extension( "zip" ),
        );
        assert_eq!( outcome.packages.keys().collect_vec(), [ "a" ] );

        let a = &outcome.packages["a"];
        assert_eq!( a.desc(), "zipped" );
        assert_eq!( a.game_data_dir(), game.path().join( "packages/a.zip" ) );
        assert_eq!( a.user_data_dir(), user.path().join( "packages/a.zip" ) );
    }

    #[ test ]
    fn symlinked_namespace_is_followed() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();

        describe( &elsewhere.child( "modname.smcpkg" ), "linked" );
        game.child( "packages" ).create_dir_all().unwrap();
        game.child( "packages/category" ).symlink_to_dir( elsewhere.path() ).unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert_eq!( registry.get( "category/modname" ).unwrap().desc(), "linked" );
    }

    #[ test ]
    fn symlink_loop_terminates() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/cat/inner.smcpkg" ).create_dir_all().unwrap();
        game.child( "packages/cat/again" )
            .symlink_to_dir( game.child( "packages/cat" ).path() )
            .unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        let names = registry.list().into_iter()
            .map( |it| it.name() )
            .collect_vec();
        assert_eq!( names, [ "cat/inner" ] );
    }

    #[ test ]
    fn package_contents_not_scanned() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/outer.smcpkg/nested.smcpkg" ).create_dir_all().unwrap();

        let registry = Registry::scan( &roots( &user, &game ) );
        assert!( registry.contains( "outer" ) );
        assert_eq!( registry.len(), 1 );
    }

}
