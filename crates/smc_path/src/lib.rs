use tap::Pipe;
use tap::Tap;

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// Separator used between the components of a package name,
/// independent of the platform.
pub const NAME_SEPARATOR: char = '/';

#[ derive( thiserror::Error, Debug ) ]
pub enum PathExtError {
    #[ error( r#"Path "{0}" is not absolute"# ) ]
    NotAbsolute( PathBuf ),
}

/// Extra functions to work with [`Path`].
#[ allow( clippy::missing_errors_doc ) ]
pub trait PathExt {
    /// Like [`Path::is_absolute`], but returns error if
    /// this path is not absolute.
    fn must_absolute( &self ) -> Result<&Self, PathExtError>;

    /// Whether the final component has exactly the extension `ext`
    /// (given without the leading dot).
    fn has_extension( &self, ext: &str ) -> bool;

    /// This path with the extension of the final component removed.
    fn without_extension( &self ) -> PathBuf;

    /// Encode a relative path as a `/` separated UTF-8 name.
    ///
    /// Returns [`None`] for absolute paths, paths containing `..` or `.`,
    /// empty paths, and paths that aren't valid UTF-8.
    fn to_utf8_name( &self ) -> Option<String>;
}

impl PathExt for Path {
    #[ inline ]
    fn must_absolute( &self ) -> Result<&Self, PathExtError> {
        if self.is_absolute() {
            Ok( self )
        } else {
            PathExtError::NotAbsolute( self.into() )
                .pipe( Err )
        }
    }

    #[ inline ]
    fn has_extension( &self, ext: &str ) -> bool {
        self.extension()
            .is_some_and( |it| it == ext )
    }

    #[ inline ]
    fn without_extension( &self ) -> PathBuf {
        self.to_owned()
            .tap_mut( |it| { it.set_extension( "" ); } )
    }

    fn to_utf8_name( &self ) -> Option<String> {
        let mut parts = Vec::new();
        for comp in self.components() {
            match comp {
                Component::Normal( part ) => parts.push( part.to_str()? ),
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None
        }
        parts.join( &NAME_SEPARATOR.to_string() ).pipe( Some )
    }
}

/// Decode a `/` separated UTF-8 name into a relative path,
/// the inverse of [`PathExt::to_utf8_name`].
#[ must_use ]
pub fn path_from_utf8_name( name: &str ) -> PathBuf {
    name.split( NAME_SEPARATOR )
        .filter( |it| !it.is_empty() )
        .collect()
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
mod test {

    use super::*;

    #[ test ]
    fn extension_helpers() {
        let p = Path::new( "mods/great.smcpkg" );
        assert!( p.has_extension( "smcpkg" ) );
        assert!( !p.has_extension( ".smcpkg" ) );
        assert!( !Path::new( "mods/great" ).has_extension( "smcpkg" ) );
        assert_eq!( p.without_extension(), Path::new( "mods/great" ) );
        assert_eq!(
            Path::new( "a.b.c" ).without_extension(),
            Path::new( "a.b" )
        );
    }

    #[ test ]
    fn utf8_names() {
        assert_eq!(
            Path::new( "category/modname" ).to_utf8_name().as_deref(),
            Some( "category/modname" )
        );
        assert_eq!( Path::new( "/abs" ).to_utf8_name(), None );
        assert_eq!( Path::new( "../up" ).to_utf8_name(), None );
        assert_eq!( Path::new( "" ).to_utf8_name(), None );
        assert_eq!(
            path_from_utf8_name( "category/modname" ),
            Path::new( "category" ).join( "modname" )
        );
    }

    #[ test ]
    fn must_absolute() {
        assert!( Path::new( "/a/b" ).must_absolute().is_ok() );
        assert!( Path::new( "a/b" ).must_absolute().is_err() );
    }
}
