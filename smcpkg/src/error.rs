use crate::descriptor::DescriptorError;

use std::path::PathBuf;

#[ derive( thiserror::Error, Debug ) ]
pub enum PackageError {
    #[ error( r#"Failed to parse package descriptor "{}""#, path.display() ) ]
    Descriptor {
        path: PathBuf,
        #[ source ]
        source: DescriptorError,
    },

    #[ error( r#"I/O error on "{}""#, path.display() ) ]
    Io {
        path: PathBuf,
        #[ source ]
        source: std::io::Error,
    },
}

impl PackageError {
    pub(crate) fn io( path: impl Into<PathBuf> ) -> impl FnOnce( std::io::Error ) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
