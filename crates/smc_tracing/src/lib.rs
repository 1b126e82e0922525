use tap::Tap;

pub use tracing_subscriber::filter::LevelFilter;

/// Install the fmt subscriber on stderr.
///
/// `default_level` applies when `RUST_LOG` is unset or unparsable,
/// otherwise `RUST_LOG` wins.
pub fn init_tracing_subscriber( default_level: LevelFilter ) {

    use tracing_subscriber::prelude::*;
    use tracing_subscriber::filter::EnvFilter;

    use tracing_subscriber::{
        fmt,
        registry
    };

    use std::io::IsTerminal;

    let output = std::io::stderr;

    let fmt_layer = fmt::layer()
        .with_writer( output )
        .with_ansi( output().is_terminal() )
        .with_target( false )
    ;

    let env_layer = EnvFilter::builder()
        .with_default_directive( default_level.into() )
        .from_env_lossy()
    ;

    registry()
        .with( fmt_layer )
        .with( env_layer )
        .init()

}

/// Map the count of `-v` flags to a level, starting at `INFO`.
#[ must_use ]
pub fn level_from_verbosity( verbose: u8 ) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Extension trait to [`Tap`] for tracing values inline.
pub trait TapExt: Tap {

    /// Trace self using [`tracing::trace`]
    #[ allow( clippy::inline_always ) ]
    #[ inline( always ) ]
    #[ must_use ]
    fn tap_trace( self ) -> Self
    where
        Self: std::fmt::Debug
    {
        self.tap( |it| tracing::trace!( ?it ) )
    }

    /// Same as [`TapExt::tap_trace`] but on the debug level.
    #[ allow( clippy::inline_always ) ]
    #[ inline( always ) ]
    #[ must_use ]
    fn tap_debug( self ) -> Self
    where
        Self: std::fmt::Debug
    {
        self.tap( |it| tracing::debug!( ?it ) )
    }

}

impl<T> TapExt for T where T: Sized {}

#[ cfg( test ) ]
mod test {

    use super::*;

    #[ test ]
    fn verbosity_levels() {
        assert_eq!( level_from_verbosity( 0 ), LevelFilter::INFO );
        assert_eq!( level_from_verbosity( 1 ), LevelFilter::DEBUG );
        assert_eq!( level_from_verbosity( 2 ), LevelFilter::TRACE );
        assert_eq!( level_from_verbosity( 9 ), LevelFilter::TRACE );
    }

    #[ test ]
    fn tap_returns_self() {
        let v = vec![ 1, 2, 3 ].tap_trace().tap_debug();
        assert_eq!( v, [ 1, 2, 3 ] );
    }

}
