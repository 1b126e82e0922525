//! Ordered list of directories resources are looked up in.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use itertools::Itertools;
use smc_tracing::TapExt;
use tracing::debug;
use tracing::warn;

use crate::registry::Registry;

/// Build the search path for `current`.
///
/// Starting at `current`, every package reachable through dependencies
/// contributes its user directory then its game directory, itself
/// before its dependencies, dependencies in declaration order. Each
/// package is visited once, the first visit decides its position.
/// The user root and the game root always come last.
#[ tracing::instrument( skip( registry ) ) ]
pub fn build_search_path(
    registry: &Registry,
    current: Option<&str>,
    user_root: &Path,
    game_root: &Path,
) -> Vec<PathBuf>
{
    let mut search_path = match current {
        Some( current ) => {
            let walker = Walker::new( registry ).walk( current );
            for cycle in &walker.cycles {
                warn!( "Dependency cycle: {cycle}" );
            }
            walker.search_path
        },
        None => Vec::new(),
    };

    search_path.push( user_root.to_owned() );
    search_path.push( game_root.to_owned() );

    search_path.tap_debug()
}

struct Walker<'reg> {
    registry: &'reg Registry,
    processed: HashSet<&'reg str>,
    /// Packages between the start and the one being visited.
    chain: Vec<&'reg str>,
    search_path: Vec<PathBuf>,
    /// Every dependency leading back onto the chain, as "a -> b -> a".
    cycles: Vec<String>,
}

impl<'reg> Walker<'reg> {
    fn new( registry: &'reg Registry ) -> Self {
        Self {
            registry,
            processed: HashSet::new(),
            chain: Vec::new(),
            search_path: Vec::new(),
            cycles: Vec::new(),
        }
    }

    fn walk( mut self, start: &str ) -> Self {
        self.visit( start );
        self
    }

    fn visit( &mut self, name: &str ) {
        if self.processed.contains( name ) {
            if self.chain.iter().any( |it| *it == name ) {
                self.cycles.push(
                    format!( "{} -> {name}", self.chain.iter().join( " -> " ) )
                );
            } else {
                debug!( name, "already in search path" );
            }
            return
        }

        let registry = self.registry;
        let Some( package ) = registry.get( name ) else {
            match self.chain.last() {
                Some( parent ) => warn!( "Package {parent} uses unknown package {name}" ),
                None => debug!( name, "unknown package" ),
            }
            return
        };

        self.processed.insert( package.name() );
        self.search_path.push( package.user_data_dir().to_owned() );
        self.search_path.push( package.game_data_dir().to_owned() );

        self.chain.push( package.name() );
        for dependency in package.dependencies() {
            self.visit( dependency );
        }
        self.chain.pop();
    }
}

#[ cfg( test ) ]
mod test {

    use super::*;

    use crate::package::PackageInfo;
    use tap::Pipe;

    fn registry( packages: &[( &str, &[&str] )] ) -> Registry {
        packages.iter()
            .map( |( name, deps )| PackageInfo::stub( name, deps ) )
            .collect_vec()
            .pipe( Registry::from_packages )
    }

    fn build( registry: &Registry, current: Option<&str> ) -> Vec<PathBuf> {
        build_search_path(
            registry,
            current,
            Path::new( "/user" ),
            Path::new( "/game" ),
        )
    }

    fn expected( names: &[&str] ) -> Vec<PathBuf> {
        names.iter()
            .flat_map( |it| [
                PathBuf::from( format!( "/user/packages/{it}.smcpkg" ) ),
                PathBuf::from( format!( "/game/packages/{it}.smcpkg" ) ),
            ] )
            .chain( [ PathBuf::from( "/user" ), PathBuf::from( "/game" ) ] )
            .collect()
    }

    #[ test ]
    fn no_package_only_defaults() {
        let reg = registry( &[ ( "a", &[] ) ] );
        assert_eq!( build( &reg, None ), expected( &[] ) );
    }

    #[ test ]
    fn unknown_package_only_defaults() {
        let reg = registry( &[ ( "a", &[] ) ] );
        assert_eq!( build( &reg, Some( "nope" ) ), expected( &[] ) );
    }

    #[ test ]
    fn chain_in_pre_order() {
        let reg = registry( &[
            ( "a", &[ "b" ] ),
            ( "b", &[ "c" ] ),
            ( "c", &[] ),
        ] );
        assert_eq!( build( &reg, Some( "a" ) ), expected( &[ "a", "b", "c" ] ) );
        assert_eq!( build( &reg, Some( "b" ) ), expected( &[ "b", "c" ] ) );
    }

    #[ test ]
    fn cycle_terminates() {
        let reg = registry( &[
            ( "a", &[ "b" ] ),
            ( "b", &[ "c" ] ),
            ( "c", &[ "a" ] ),
        ] );
        assert_eq!( build( &reg, Some( "a" ) ), expected( &[ "a", "b", "c" ] ) );
    }

    #[ test ]
    fn self_dependency() {
        let reg = registry( &[ ( "a", &[ "a", "a" ] ) ] );
        assert_eq!( build( &reg, Some( "a" ) ), expected( &[ "a" ] ) );
        assert_eq!( Walker::new( &reg ).walk( "a" ).cycles, [ "a -> a", "a -> a" ] );
    }

    #[ test ]
    fn cycle_told_apart_from_diamond() {
        let cyclic = registry( &[
            ( "a", &[ "b" ] ),
            ( "b", &[ "c" ] ),
            ( "c", &[ "a" ] ),
        ] );
        assert_eq!(
            Walker::new( &cyclic ).walk( "a" ).cycles,
            [ "a -> b -> c -> a" ]
        );
        assert_eq!(
            Walker::new( &cyclic ).walk( "b" ).cycles,
            [ "b -> c -> a -> b" ]
        );

        let diamond = registry( &[
            ( "a", &[ "b", "c" ] ),
            ( "b", &[ "d" ] ),
            ( "c", &[ "d" ] ),
            ( "d", &[] ),
        ] );
        let walker = Walker::new( &diamond ).walk( "a" );
        assert!( walker.cycles.is_empty() );
        assert_eq!( walker.processed.len(), 4 );
    }

    #[ test ]
    fn diamond_first_visit_wins() {
        let reg = registry( &[
            ( "a", &[ "b", "c" ] ),
            ( "b", &[ "d" ] ),
            ( "c", &[ "d" ] ),
            ( "d", &[] ),
        ] );
        assert_eq!(
            build( &reg, Some( "a" ) ),
            expected( &[ "a", "b", "d", "c" ] )
        );
    }

    #[ test ]
    fn unknown_dependency_skipped() {
        let reg = registry( &[
            ( "a", &[ "ghost", "b" ] ),
            ( "b", &[] ),
        ] );
        assert_eq!( build( &reg, Some( "a" ) ), expected( &[ "a", "b" ] ) );
    }

    #[ test ]
    fn nested_names() {
        let reg = registry( &[
            ( "cat/a", &[ "cat/b" ] ),
            ( "cat/b", &[] ),
        ] );
        assert_eq!(
            build( &reg, Some( "cat/a" ) ),
            expected( &[ "cat/a", "cat/b" ] )
        );
    }

}
