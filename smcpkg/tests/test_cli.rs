#![ allow( clippy::unwrap_used ) ]
#![ allow( clippy::expect_used ) ]

use assert_fs::prelude::*;
use assert_fs::TempDir;

use std::process::Command;
use std::process::Output;

macro_rules! make_tempdir {
    () => { {
        TempDir::new().expect( "Failed to setup tempdir" )
    } };
}

struct Data {
    user: TempDir,
    game: TempDir,
}

impl Data {
    /// `forest` uses `common`, `secret` is hidden.
    fn new() -> Self {
        let user = make_tempdir!();
        let game = make_tempdir!();

        game.child( "packages/forest.smcpkg/package.xml" )
            .write_str( r#"<package>
                <settings><property name="description" value="Trees" /></settings>
                <use><property name="package" value="common" /></use>
            </package>"# )
            .unwrap();
        game.child( "packages/common.smcpkg" ).create_dir_all().unwrap();
        game.child( "packages/secret.smcpkg/package.xml" )
            .write_str( r#"<package><settings>
                <property name="hidden" value="1" />
            </settings></package>"# )
            .unwrap();

        game.child( "pixmaps/ground.png" ).touch().unwrap();
        game.child( "packages/common.smcpkg/pixmaps/ground.settings" )
            .touch().unwrap();

        Self { user, game }
    }

    fn command( &self ) -> Command {
        let exe = std::env!( "CARGO_BIN_EXE_smcpkg" );
        let mut cmd = Command::new( exe );
        cmd.env_remove( "SMC_PACKAGE" )
            .env_remove( "SMC_SAVEGAMES" )
            .env_remove( "SMC_SCREENSHOTS" )
            .env( "SMC_USER_DATA", self.user.path() )
            .env( "SMC_GAME_DATA", self.game.path() )
            .env( "RUST_LOG", "warn" );
        cmd
    }

    fn run( &self, args: &[&str] ) -> Output {
        self.command().args( args ).output().unwrap()
    }
}

fn stdout_lines( output: &Output ) -> Vec<String> {
    String::from_utf8_lossy( &output.stdout )
        .lines()
        .map( str::to_owned )
        .collect()
}

#[ test ]
fn list_visible() {
    let data = Data::new();
    let res = data.run( &[ "list" ] );
    assert!( res.status.success() );
    assert_eq!( stdout_lines( &res ), [ "common", "forest\tTrees" ] );
}

#[ test ]
fn list_all() {
    let data = Data::new();
    let res = data.run( &[ "list", "--all" ] );
    assert!( res.status.success() );
    assert_eq!(
        stdout_lines( &res ),
        [ "common", "forest\tTrees", "secret (hidden)" ]
    );
}

#[ test ]
fn search_path_of_package() {
    let data = Data::new();
    let res = data.run( &[ "--package", "forest", "search-path" ] );
    assert!( res.status.success() );

    let pkg = |root: &TempDir, name: &str| root.path()
        .join( format!( "packages/{name}.smcpkg" ) )
        .display()
        .to_string();

    assert_eq!( stdout_lines( &res ), [
        pkg( &data.user, "forest" ),
        pkg( &data.game, "forest" ),
        pkg( &data.user, "common" ),
        pkg( &data.game, "common" ),
        data.user.path().display().to_string(),
        data.game.path().display().to_string(),
    ] );

    // read-only commands leave the user directory alone
    assert!( !data.user.child( "packages" ).path().exists() );
}

#[ test ]
fn unknown_package_fails() {
    let data = Data::new();
    let res = data.run( &[ "--package", "nope", "search-path" ] );
    assert!( !res.status.success() );
    assert!( String::from_utf8_lossy( &res.stderr )
        .contains( r#"No package named "nope""# ) );
}

#[ test ]
fn find_with_fallback_extension() {
    let data = Data::new();

    let res = data.run( &[
        "-p", "forest", "find", "pixmaps", "ground.png", "--ext", ".settings"
    ] );
    assert!( res.status.success() );
    assert_eq!( stdout_lines( &res ), [
        data.game.path()
            .join( "packages/common.smcpkg/pixmaps/ground.settings" )
            .display()
            .to_string()
    ] );

    let res = data.run( &[ "find", "pixmaps", "ground.png" ] );
    assert!( res.status.success() );
    assert_eq!( stdout_lines( &res ), [
        data.game.path().join( "pixmaps/ground.png" ).display().to_string()
    ] );

    let res = data.run( &[ "find", "sounds", "nothing.ogg" ] );
    assert!( !res.status.success() );
}

#[ test ]
fn relative_resource_path() {
    let data = Data::new();
    let file = data.game.path()
        .join( "packages/common.smcpkg/pixmaps/ground.settings" );

    let res = data.command()
        .args( [ "-p", "forest", "relative", "pixmaps" ] )
        .arg( &file )
        .output().unwrap();
    assert!( res.status.success() );
    assert_eq!( stdout_lines( &res ), [ "ground.settings" ] );

    let res = data.run( &[ "relative", "pixmaps", "not/absolute.png" ] );
    assert!( !res.status.success() );
    assert!( String::from_utf8_lossy( &res.stderr ).contains( "not absolute" ) );
}

#[ test ]
fn init_creates_directories() {
    let data = Data::new();
    let res = data.run( &[ "-p", "forest", "init" ] );
    assert!( res.status.success() );

    for dir in [
        "packages/forest.smcpkg/levels",
        "packages/forest.smcpkg/campaigns",
        "packages/forest.smcpkg/worlds",
        "savegames/forest",
        "screenshots/forest",
    ] {
        assert!( data.user.child( dir ).path().is_dir(), "{dir}" );
    }
}

#[ test ]
fn show_package() {
    let data = Data::new();
    let res = data.run( &[ "show", "forest" ] );
    assert!( res.status.success() );
    let lines = stdout_lines( &res );
    assert!( lines.contains( &"description: Trees".to_owned() ) );
    assert!( lines.contains( &"uses: common".to_owned() ) );

    let res = data.run( &[ "show", "nope" ] );
    assert!( !res.status.success() );
}

#[ test ]
fn list_reports_broken_package() {
    let data = Data::new();
    data.game.child( "packages/broken.smcpkg/package.xml" )
        .write_str( "<package><settings>" )
        .unwrap();

    let res = data.run( &[ "list" ] );
    assert!( res.status.success() );
    assert_eq!( stdout_lines( &res ), [ "common", "forest\tTrees" ] );

    let stderr = String::from_utf8_lossy( &res.stderr );
    let line = stderr.lines()
        .find( |it| it.starts_with( "skipped broken: " ) )
        .expect( "broken package reported" );
    assert!( line.contains( "Failed to parse package descriptor" ) );
    assert!( line.contains( "broken.smcpkg/package.xml\": " ) );
}
