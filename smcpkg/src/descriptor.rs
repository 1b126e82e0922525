//! The `package.xml` descriptor.
//!
//! ```xml
//! <package>
//!     <settings>
//!         <property name="description" value="Levels from the forest" />
//!         <property name="hidden" value="0" />
//!     </settings>
//!     <use>
//!         <property name="package" value="common/trees" />
//!     </use>
//! </package>
//! ```
//!
//! Tags and attributes are recognized in exactly two spellings,
//! all-lowercase and capitalized, e.g. `property` and `Property`.
//! Nothing else is folded, `PROPERTY` is just an unknown element.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use tap::Pipe;
use tracing::debug;
use tracing::trace;

use crate::error::PackageError;

/// File name of the descriptor inside a package directory.
pub const DESCRIPTOR_FILE: &str = "package.xml";

const SETTINGS_TAG: [&str; 2] = [ "settings", "Settings" ];
const USE_TAG: [&str; 2] = [ "use", "Use" ];
const PROPERTY_TAG: [&str; 2] = [ "property", "Property" ];
const NAME_ATTR: [&str; 2] = [ "name", "Name" ];
const VALUE_ATTR: [&str; 2] = [ "value", "Value" ];

const DESCRIPTION_KEY: &str = "description";
const HIDDEN_KEY: &str = "hidden";
const PACKAGE_KEY: &str = "package";

#[ derive( thiserror::Error, Debug ) ]
pub enum DescriptorError {
    #[ error( "Invalid XML" ) ]
    Xml( #[ from ] quick_xml::Error ),

    #[ error( "{0}" ) ]
    Malformed( String ),
}

/// Fields a descriptor contributes to a package.
#[ derive( Debug, Default, Clone, PartialEq, Eq ) ]
pub struct Descriptor {
    pub description: String,
    pub hidden: bool,
    pub dependencies: Vec<String>,
}

impl Descriptor {
    #[ tracing::instrument ]
    pub fn from_file( path: &Path ) -> Result<Self, PackageError> {
        debug!( "read package descriptor" );
        std::fs::read_to_string( path )
            .map_err( PackageError::io( path ) )?
            .pipe_deref( Self::parse )
            .map_err( |source| PackageError::Descriptor {
                path: path.to_owned(),
                source,
            } )
    }

    #[ tracing::instrument( skip_all ) ]
    pub fn parse( text: &str ) -> Result<Self, DescriptorError> {
        let root = Element::parse_document( text )?;
        trace!( ?root );
        let mut descriptor = Self::default();
        descriptor.collect( &root );
        Ok( descriptor )
    }

    /// Visit in the order elements are closed, so a later `settings`
    /// overrides an earlier one.
    fn collect( &mut self, element: &Element ) {
        if element.is( &PROPERTY_TAG ) {
            return
        }

        for child in &element.children {
            self.collect( child );
        }

        if element.is( &USE_TAG ) {
            let package = element.properties()
                .remove( PACKAGE_KEY )
                .unwrap_or_default();
            if package.is_empty() {
                debug!( "use without package name, ignore" );
            } else {
                self.dependencies.push( package );
            }
        } else if element.is( &SETTINGS_TAG ) {
            let mut props = element.properties();
            self.description = props.remove( DESCRIPTION_KEY )
                .unwrap_or_default();
            self.hidden = props.get( HIDDEN_KEY )
                .is_some_and( |it| parse_flag( it ) );
        }
    }
}

/// Read a flag the way `atoi` reads a number: optional leading
/// whitespace and sign, then as many digits as there are.
/// Any non-zero number is true, everything else is false.
#[ must_use ]
pub fn parse_flag( raw: &str ) -> bool {
    let rest = raw.trim_start();
    let rest = rest.strip_prefix( [ '+', '-' ] ).unwrap_or( rest );
    rest.chars()
        .take_while( char::is_ascii_digit )
        .any( |it| it != '0' )
}

/// Minimal element tree, enough for descriptors.
#[ derive( Debug, Default ) ]
struct Element {
    name: String,
    attributes: Vec<( String, String )>,
    children: Vec<Element>,
}

impl Element {
    fn parse_document( text: &str ) -> Result<Self, DescriptorError> {
        let mut reader = Reader::from_str( text );
        reader.config_mut().trim_text( true );

        let mut stack: Vec<Self> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start( start ) => {
                    stack.push( Self::from_start( &start )? );
                },
                Event::Empty( start ) => {
                    let element = Self::from_start( &start )?;
                    Self::attach( &mut stack, &mut root, element )?;
                },
                Event::End( _ ) => {
                    let element = stack.pop()
                        .ok_or_else( || DescriptorError::Malformed(
                            "closing tag without opening tag".into()
                        ) )?;
                    Self::attach( &mut stack, &mut root, element )?;
                },
                Event::Eof => break,
                _ => {},
            }
        }

        if let Some( open ) = stack.last() {
            return Err( DescriptorError::Malformed(
                format!( "element <{}> is never closed", open.name )
            ) )
        }

        root.ok_or_else( || DescriptorError::Malformed(
            "document has no root element".into()
        ) )
    }

    fn from_start( start: &BytesStart<'_> ) -> Result<Self, DescriptorError> {
        let name = String::from_utf8_lossy( start.name().as_ref() )
            .into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err( quick_xml::Error::from )?;
            let key = String::from_utf8_lossy( attr.key.as_ref() )
                .into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push( ( key, value ) );
        }
        Ok( Self { name, attributes, children: vec![] } )
    }

    fn attach(
        stack: &mut [Self],
        root: &mut Option<Self>,
        element: Self,
    ) -> Result<(), DescriptorError> {
        if let Some( parent ) = stack.last_mut() {
            parent.children.push( element );
        } else if root.is_none() {
            *root = Some( element );
        } else {
            return Err( DescriptorError::Malformed(
                "more than one root element".into()
            ) )
        }
        Ok(())
    }

    fn is( &self, spellings: &[&str] ) -> bool {
        spellings.contains( &self.name.as_str() )
    }

    /// Last matching attribute wins.
    fn attribute( &self, spellings: &[&str] ) -> Option<&str> {
        self.attributes.iter()
            .rev()
            .find( |( key, _ )| spellings.contains( &key.as_str() ) )
            .map( |( _, value )| value.as_str() )
    }

    /// Key/value pairs of the direct `property` children.
    fn properties( &self ) -> HashMap<String, String> {
        self.children.iter()
            .filter( |it| it.is( &PROPERTY_TAG ) )
            .map( |it| (
                it.attribute( &NAME_ATTR ).unwrap_or_default().to_owned(),
                it.attribute( &VALUE_ATTR ).unwrap_or_default().to_owned(),
            ) )
            .collect()
    }
}

#[ cfg( test ) ]
#[ allow( clippy::unwrap_used ) ]
mod test {

    use super::*;

    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    #[ test ]
    fn full_descriptor() {
        let desc = Descriptor::parse( r#"
            <package>
                <settings>
                    <property name="description" value="Forest &amp; lakes" />
                    <property name="hidden" value="1" />
                </settings>
                <use><property name="package" value="common/trees" /></use>
                <use><property name="package" value="water" /></use>
                <use><property name="package" value="common/trees" /></use>
            </package>
        "# ).unwrap();

        assert_eq!( desc.description, "Forest & lakes" );
        assert!( desc.hidden );
        assert_eq!(
            desc.dependencies,
            [ "common/trees", "water", "common/trees" ]
        );
    }

    #[ test ]
    fn capitalized_spellings() {
        let lower = Descriptor::parse( r#"
            <package>
                <settings><property name="description" value="x" /></settings>
                <use><property name="package" value="dep" /></use>
            </package>
        "# ).unwrap();
        let upper = Descriptor::parse( r#"
            <Package>
                <Settings><Property Name="description" Value="x" /></Settings>
                <Use><Property Name="package" Value="dep" /></Use>
            </Package>
        "# ).unwrap();
        assert_eq!( lower, upper );
    }

    #[ test ]
    fn no_general_case_folding() {
        let desc = Descriptor::parse( r#"
            <package>
                <SETTINGS><property name="description" value="x" /></SETTINGS>
                <use><PROPERTY name="package" value="dep" /></use>
                <use><property NAME="package" value="dep2" /></use>
            </package>
        "# ).unwrap();
        assert_eq!( desc, Descriptor::default() );
    }

    #[ test ]
    fn empty_root_is_default() {
        assert_eq!(
            Descriptor::parse( "<package/>" ).unwrap(),
            Descriptor::default()
        );
    }

    #[ test ]
    fn later_settings_override() {
        let desc = Descriptor::parse( r#"
            <package>
                <settings><property name="description" value="first" /></settings>
                <settings><property name="hidden" value="1" /></settings>
            </package>
        "# ).unwrap();
        assert_eq!( desc.description, "" );
        assert!( desc.hidden );
    }

    #[ test ]
    fn malformed_documents() {
        assert!( Descriptor::parse( "" ).is_err() );
        assert!( Descriptor::parse( "<package><settings></package>" ).is_err() );
        assert!( Descriptor::parse( "<package>" ).is_err() );
        assert!( Descriptor::parse( "<a/><b/>" ).is_err() );
        assert!( Descriptor::parse( r#"<a x="1" x="2"/>"# ).is_err() );
    }

    #[ test ]
    fn flag_parsing() {
        for truthy in [ "1", "12abc", "-3", "  7", "+2" ] {
            assert!( parse_flag( truthy ), "{truthy}" );
        }
        for falsy in [ "0", "yes", "", "-0", "abc1", "true" ] {
            assert!( !parse_flag( falsy ), "{falsy}" );
        }
    }

    #[ test ]
    fn from_file_errors() {
        let top = TempDir::new().unwrap();

        let missing = top.child( "missing.xml" );
        assert!( matches!(
            Descriptor::from_file( missing.path() ),
            Err( PackageError::Io { .. } )
        ) );

        let broken = top.child( "broken.xml" );
        broken.write_str( "<package><use>" ).unwrap();
        assert!( matches!(
            Descriptor::from_file( broken.path() ),
            Err( PackageError::Descriptor { .. } )
        ) );
    }

}
