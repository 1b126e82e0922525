//! Resolving resources against a search path.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::trace;
use tracing::warn;

/// Find the file to read `resource` of category `dir` from.
///
/// Each search path entry is exhausted before moving on to the next:
/// first `<entry>/<dir>/<resource>` itself, then the same path with
/// its extension swapped for each of `extra_ext` in order.
/// Extensions may be given with or without the leading dot.
///
/// `dir` and `resource` must stay below the entry: absolute paths or
/// ones with `..` are never found.
#[ tracing::instrument( skip( search_path ) ) ]
pub fn find_reading_path<S>(
    search_path: &[PathBuf],
    dir: &Path,
    resource: &Path,
    extra_ext: &[S],
) -> Option<PathBuf>
where
    S: AsRef<str> + std::fmt::Debug
{
    if !is_contained( dir ) || !is_contained( resource ) {
        warn!( "Refusing to look up {} outside of {}", resource.display(), dir.display() );
        return None
    }

    for entry in search_path {
        let mut path = entry.join( dir ).join( resource );
        trace!( ?path, "try" );
        if exists( &path ) {
            debug!( ?path, "found" );
            return Some( path )
        }
        for ext in extra_ext {
            let ext = ext.as_ref();
            path.set_extension( ext.strip_prefix( '.' ).unwrap_or( ext ) );
            trace!( ?path, "try with extension" );
            if exists( &path ) {
                debug!( ?path, "found" );
                return Some( path )
            }
        }
    }
    debug!( "not found in any search path entry" );
    None
}

/// Express `path` relative to the `<entry>/<dir>` of the first search
/// path entry containing it.
///
/// Only files below that directory count, the directory itself doesn't.
/// Paths are compared by components, nothing is canonicalized, so
/// paths containing `..` are never below anything.
#[ tracing::instrument( skip( search_path ) ) ]
pub fn find_relative_path(
    search_path: &[PathBuf],
    dir: &Path,
    path: &Path,
) -> Option<PathBuf>
{
    if path.components().any( |it| it == Component::ParentDir ) {
        debug!( "path goes up, not below any entry" );
        return None
    }
    let parent = path.parent()?;
    for entry in search_path {
        let subdir = entry.join( dir );
        if parent.starts_with( &subdir ) {
            let relative = path.strip_prefix( &subdir ).ok()?;
            debug!( ?subdir, ?relative, "found containing entry" );
            return Some( relative.to_owned() )
        }
    }
    debug!( "not under any search path entry" );
    None
}

/// Joining this to a directory stays below that directory.
fn is_contained( path: &Path ) -> bool {
    path.components()
        .all( |it| matches!( it, Component::Normal( _ ) | Component::CurDir ) )
}

fn exists( path: &Path ) -> bool {
    path.try_exists()
        .inspect_err( |err| warn!( "Can't check {}: {err}", path.display() ) )
        .unwrap_or( false )
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
mod test {

    use super::*;

    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const NO_EXT: &[&str] = &[];

    struct Layered {
        top: TempDir,
        p1: PathBuf,
        p2: PathBuf,
    }

    impl Layered {
        fn new() -> Self {
            let top = TempDir::new().unwrap();
            let p1 = top.child( "p1" ).path().to_owned();
            let p2 = top.child( "p2" ).path().to_owned();
            Self { top, p1, p2 }
        }

        fn search_path( &self ) -> Vec<PathBuf> {
            vec![ self.p1.clone(), self.p2.clone() ]
        }

        fn touch( &self, path: PathBuf ) -> PathBuf {
            std::fs::create_dir_all( path.parent().unwrap() ).unwrap();
            std::fs::write( &path, b"" ).unwrap();
            path
        }
    }

    fn find( l: &Layered, resource: &str, ext: &[&str] ) -> Option<PathBuf> {
        find_reading_path(
            &l.search_path(),
            Path::new( "pixmaps" ),
            Path::new( resource ),
            ext,
        )
    }

    #[ test ]
    fn bare_name_first() {
        let l = Layered::new();
        let png = l.touch( l.p1.join( "pixmaps/foo.png" ) );
        l.touch( l.p1.join( "pixmaps/foo.settings" ) );
        assert_eq!( find( &l, "foo.png", &[ ".settings" ] ), Some( png ) );
    }

    #[ test ]
    fn extension_fallback_in_same_entry() {
        let l = Layered::new();
        let settings = l.touch( l.p1.join( "pixmaps/foo.settings" ) );
        l.touch( l.p2.join( "pixmaps/foo.png" ) );
        assert_eq!(
            find( &l, "foo.png", &[ ".settings" ] ),
            Some( settings )
        );
    }

    #[ test ]
    fn next_entry_after_exhausting_first() {
        let l = Layered::new();
        let png = l.touch( l.p2.join( "pixmaps/foo.png" ) );
        l.touch( l.p2.join( "pixmaps/foo.settings" ) );
        assert_eq!( find( &l, "foo.png", &[ ".settings" ] ), Some( png ) );
    }

    #[ test ]
    fn extensions_in_order() {
        let l = Layered::new();
        l.touch( l.p1.join( "pixmaps/foo.b" ) );
        let a = l.touch( l.p1.join( "pixmaps/foo.a" ) );
        assert_eq!( find( &l, "foo.png", &[ "a", ".b" ] ), Some( a ) );
    }

    #[ test ]
    fn nothing_found() {
        let l = Layered::new();
        assert_eq!( find( &l, "foo.png", &[ ".settings" ] ), None );
        l.touch( l.p1.join( "pixmaps/foo.settings" ) );
        assert_eq!( find( &l, "foo.png", NO_EXT ), None );
    }

    #[ test ]
    fn nested_resource() {
        let l = Layered::new();
        let deep = l.touch( l.p2.join( "pixmaps/enemy/krush/big.png" ) );
        assert_eq!( find( &l, "enemy/krush/big.png", NO_EXT ), Some( deep ) );
    }

    #[ test ]
    fn resource_cannot_escape_entry() {
        let l = Layered::new();
        let outside = l.touch( l.top.child( "outside/secret.png" ).path().to_owned() );
        l.touch( l.p1.join( "pixmaps/inside.png" ) );

        assert_eq!( find( &l, &outside.display().to_string(), NO_EXT ), None );
        assert_eq!( find( &l, "../../outside/secret.png", NO_EXT ), None );
        assert_eq!( find( &l, "./inside.png", NO_EXT ), Some( l.p1.join( "pixmaps/inside.png" ) ) );

        assert_eq!(
            find_reading_path(
                &l.search_path(),
                Path::new( "../outside" ),
                Path::new( "secret.png" ),
                NO_EXT,
            ),
            None
        );
    }

    #[ test ]
    fn relative_to_first_matching_entry() {
        let search_path = vec![
            PathBuf::from( "/data/packages/a.smcpkg" ),
            PathBuf::from( "/data" ),
        ];
        let relative = find_relative_path(
            &search_path,
            Path::new( "pixmaps" ),
            Path::new( "/data/packages/a.smcpkg/pixmaps/ground/grass.png" ),
        );
        assert_eq!( relative, Some( PathBuf::from( "ground/grass.png" ) ) );

        let relative = find_relative_path(
            &search_path,
            Path::new( "pixmaps" ),
            Path::new( "/data/pixmaps/ground/grass.png" ),
        );
        assert_eq!( relative, Some( PathBuf::from( "ground/grass.png" ) ) );
    }

    #[ test ]
    fn first_entry_wins_even_if_later_is_prefix() {
        // both entries contain the file
        let search_path = vec![
            PathBuf::from( "game/data" ),
            PathBuf::from( "game" ),
        ];
        let relative = find_relative_path(
            &search_path,
            Path::new( "" ),
            Path::new( "game/data/music/theme.ogg" ),
        );
        assert_eq!( relative, Some( PathBuf::from( "music/theme.ogg" ) ) );
    }

    #[ test ]
    fn relative_not_found() {
        let search_path = vec![ PathBuf::from( "/data" ) ];
        for outside in [
            "/elsewhere/pixmaps/a.png",
            "/data/sounds/a.ogg",
            "/data/pixmaps",
            "/database/pixmaps/a.png",
            "/data/pixmaps/../sounds/a.ogg",
            "/data/pixmaps/sub/../../sounds/a.ogg",
            "a.png",
        ] {
            assert_eq!(
                find_relative_path(
                    &search_path,
                    Path::new( "pixmaps" ),
                    Path::new( outside ),
                ),
                None,
                "{outside}"
            );
        }
    }

}
