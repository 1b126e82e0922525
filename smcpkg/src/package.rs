use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use smc_path::path_from_utf8_name;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::descriptor::DESCRIPTOR_FILE;
use crate::error::PackageError;
use crate::roots::ResourceRoots;

/// Extension of a package directory under a `packages` root.
pub const PACKAGE_EXTENSION: &str = "smcpkg";

/// One installed package.
#[ derive( Debug, Clone, Default, PartialEq, Eq ) ]
pub struct PackageInfo {
    name: String,
    desc: String,
    hidden: bool,
    dependencies: Vec<String>,
    user_data_dir: PathBuf,
    game_data_dir: PathBuf,
}

impl PackageInfo {
    pub fn name( &self ) -> &str { &self.name }
    pub fn desc( &self ) -> &str { &self.desc }
    pub fn hidden( &self ) -> bool { self.hidden }
    pub fn dependencies( &self ) -> &[String] { &self.dependencies }
    pub fn user_data_dir( &self ) -> &Path { &self.user_data_dir }
    pub fn game_data_dir( &self ) -> &Path { &self.game_data_dir }

    /// Package under the `/user` and `/game` roots, without touching disk.
    #[ cfg( test ) ]
    pub( crate ) fn stub( name: &str, dependencies: &[&str] ) -> Self {
        let entry = package_entry( name );
        Self {
            name: name.to_owned(),
            dependencies: dependencies.iter()
                .map( |it| ( *it ).to_owned() )
                .collect(),
            user_data_dir: Path::new( "/user/packages" ).join( &entry ),
            game_data_dir: Path::new( "/game/packages" ).join( &entry ),
            ..Self::default()
        }
    }
}

/// `<name>.smcpkg`, where a package lives below a `packages` root
/// unless the scan found it under another extension.
#[ must_use ]
pub fn package_entry( name: &str ) -> PathBuf {
    let mut entry = path_from_utf8_name( name );
    // set_extension would eat a dot already in the name
    let file_name = entry.file_name()
        .map( |it| {
            let mut it = it.to_owned();
            it.push( "." );
            it.push( PACKAGE_EXTENSION );
            it
        } );
    if let Some( file_name ) = file_name {
        entry.set_file_name( file_name );
    }
    entry
}

/// Build the [`PackageInfo`] of `name`, found at `entry` relative to
/// a `packages` root.
///
/// The descriptor in the user data root is preferred over the one
/// in the game data root. Having none at all is fine and yields
/// a package with default settings, as does an archive file.
///
/// # Errors
///
/// Fails only if a descriptor exists but can't be read or parsed.
#[ tracing::instrument( skip( roots ) ) ]
pub fn load_package_info( name: &str, entry: &Path, roots: &ResourceRoots )
    -> Result<PackageInfo, PackageError>
{
    let user_data_dir = roots.user_packages().join( entry );
    let game_data_dir = roots.game_packages().join( entry );

    let candidates = [
        user_data_dir.join( DESCRIPTOR_FILE ),
        game_data_dir.join( DESCRIPTOR_FILE ),
    ];

    let mut descriptor = Descriptor::default();
    for candidate in candidates {
        let exists = match candidate.try_exists() {
            Ok( it ) => it,
            // the package is a plain file
            Err( err ) if err.kind() == ErrorKind::NotADirectory => false,
            Err( err ) => return Err( PackageError::io( &candidate )( err ) ),
        };
        if exists {
            debug!( ?candidate, "found descriptor" );
            descriptor = Descriptor::from_file( &candidate )?;
            break
        }
    }

    let Descriptor { description, hidden, dependencies } = descriptor;

    Ok( PackageInfo {
        name: name.to_owned(),
        desc: description,
        hidden,
        dependencies,
        user_data_dir,
        game_data_dir,
    } )
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
mod test {

    use super::*;

    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn descriptor( description: &str ) -> String {
        format!( r#"<package><settings>
            <property name="description" value="{description}" />
        </settings></package>"# )
    }

    fn roots( user: &TempDir, game: &TempDir ) -> ResourceRoots {
        ResourceRoots::with_defaults(
            user.path().to_owned(),
            game.path().to_owned(),
        )
    }

    fn load( name: &str, roots: &ResourceRoots ) -> Result<PackageInfo, PackageError> {
        load_package_info( name, &package_entry( name ), roots )
    }

    #[ test ]
    fn package_entry_layout() {
        assert_eq!(
            package_entry( "cat/forest" ),
            Path::new( "cat/forest.smcpkg" )
        );
        assert_eq!( package_entry( "v1.2" ), Path::new( "v1.2.smcpkg" ) );
    }

    #[ test ]
    fn missing_descriptor_gives_defaults() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        let info = load( "lonely", &roots( &user, &game ) ).unwrap();

        assert_eq!( info.name(), "lonely" );
        assert_eq!( info.desc(), "" );
        assert!( !info.hidden() );
        assert!( info.dependencies().is_empty() );
        assert_eq!(
            info.user_data_dir(),
            user.path().join( "packages/lonely.smcpkg" )
        );
        assert_eq!(
            info.game_data_dir(),
            game.path().join( "packages/lonely.smcpkg" )
        );
    }

    #[ test ]
    fn user_descriptor_preferred() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();
        let roots = roots( &user, &game );

        user.child( "packages/both.smcpkg/package.xml" )
            .write_str( &descriptor( "from user" ) ).unwrap();
        game.child( "packages/both.smcpkg/package.xml" )
            .write_str( &descriptor( "from game" ) ).unwrap();
        game.child( "packages/game-only.smcpkg/package.xml" )
            .write_str( &descriptor( "from game" ) ).unwrap();

        assert_eq!( load( "both", &roots ).unwrap().desc(), "from user" );
        assert_eq!( load( "game-only", &roots ).unwrap().desc(), "from game" );
    }

    #[ test ]
    fn entry_found_on_disk_is_used() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/cat/a.zip/package.xml" )
            .write_str( &descriptor( "zipped" ) ).unwrap();

        let info = load_package_info(
            "cat/a",
            Path::new( "cat/a.zip" ),
            &roots( &user, &game ),
        ).unwrap();
        assert_eq!( info.desc(), "zipped" );
        assert_eq!( info.game_data_dir(), game.path().join( "packages/cat/a.zip" ) );
    }

    #[ test ]
    fn archive_file_has_defaults() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        game.child( "packages/packed.smcpkg" ).touch().unwrap();

        let info = load( "packed", &roots( &user, &game ) ).unwrap();
        assert_eq!( info.desc(), "" );
    }

    #[ test ]
    fn malformed_descriptor_fails() {
        let user = TempDir::new().unwrap();
        let game = TempDir::new().unwrap();

        user.child( "packages/bad.smcpkg/package.xml" )
            .write_str( "<package><settings>" ).unwrap();

        assert!( load( "bad", &roots( &user, &game ) ).is_err() );
    }

}
