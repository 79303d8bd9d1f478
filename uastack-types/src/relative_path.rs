//! The text form of relative paths, as used by TranslateBrowsePathsToNodeIds
//! tooling. Reserved characters in names are escaped with `&`.
//!
//! ```text
//! Path       := Element+
//! Element    := RefSpec TargetName?
//! RefSpec    := '/'                      forward HierarchicalReferences
//!             | '.'                      forward Aggregates
//!             | '<' '#'? '!'? QName '>'  explicit reference type
//! TargetName := QName                    may be empty on the last element
//! QName      := (digits ':')? Chars      digits is the namespace index
//! ```

use std::fmt;

use crate::{
    node_id::NodeId,
    node_ids::ReferenceTypeId,
    qualified_name::QualifiedName,
    service::{RelativePath, RelativePathElement},
    status_code::StatusCode,
};

/// The characters that must be escaped with `&` inside names.
pub const RESERVED_CHARS: &str = "/.<>:#!&";

/// Resolves a reference type browse name to its node id. Paths with
/// explicit `<Name>` reference specifiers need one; the standard resolver
/// knows the namespace 0 hierarchy.
pub type ReferenceTypeResolver = dyn Fn(u16, &str) -> Option<NodeId>;

/// Resolver knowing the standard namespace 0 reference types.
pub fn standard_reference_type_resolver(namespace: u16, name: &str) -> Option<NodeId> {
    if namespace != 0 {
        return None;
    }
    let id = match name {
        "References" => ReferenceTypeId::References,
        "NonHierarchicalReferences" => ReferenceTypeId::NonHierarchicalReferences,
        "HierarchicalReferences" => ReferenceTypeId::HierarchicalReferences,
        "HasChild" => ReferenceTypeId::HasChild,
        "Organizes" => ReferenceTypeId::Organizes,
        "HasEventSource" => ReferenceTypeId::HasEventSource,
        "HasModellingRule" => ReferenceTypeId::HasModellingRule,
        "HasEncoding" => ReferenceTypeId::HasEncoding,
        "HasDescription" => ReferenceTypeId::HasDescription,
        "HasTypeDefinition" => ReferenceTypeId::HasTypeDefinition,
        "GeneratesEvent" => ReferenceTypeId::GeneratesEvent,
        "Aggregates" => ReferenceTypeId::Aggregates,
        "HasSubtype" => ReferenceTypeId::HasSubtype,
        "HasProperty" => ReferenceTypeId::HasProperty,
        "HasComponent" => ReferenceTypeId::HasComponent,
        "HasNotifier" => ReferenceTypeId::HasNotifier,
        "HasOrderedComponent" => ReferenceTypeId::HasOrderedComponent,
        _ => return None,
    };
    Some(id.into())
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Parser {
            chars: s.chars().peekable(),
        }
    }

    // Read an optionally escaped name, stopping at the first unescaped
    // character in `stop`. Arbitrary unicode passes through unescaped.
    fn read_name(&mut self, stop: &[char]) -> Result<String, StatusCode> {
        let mut name = String::new();
        loop {
            match self.chars.peek() {
                None => return Ok(name),
                Some(&c) if stop.contains(&c) => return Ok(name),
                Some(&'&') => {
                    self.chars.next();
                    match self.chars.next() {
                        Some(escaped) => name.push(escaped),
                        None => return Err(StatusCode::BadBrowseDirectionInvalid),
                    }
                }
                Some(&c) if RESERVED_CHARS.contains(c) => {
                    // Reserved char in name position that isn't a stop for
                    // this context is a syntax error.
                    return Err(StatusCode::BadNodeIdInvalid);
                }
                Some(&c) => {
                    self.chars.next();
                    name.push(c);
                }
            }
        }
    }

    // Read a qualified name: optional `digits:` namespace prefix then a
    // name. A ':' only acts as a separator after a pure digit prefix.
    fn read_qualified_name(
        &mut self,
        stop: &[char],
        default_namespace: u16,
    ) -> Result<QualifiedName, StatusCode> {
        let mut stop_with_colon = stop.to_vec();
        stop_with_colon.push(':');
        let first = self.read_name(&stop_with_colon)?;

        if self.chars.peek() == Some(&':') {
            if let Ok(namespace) = first.parse::<u16>() {
                self.chars.next();
                let name = self.read_name(stop)?;
                return Ok(make_name(namespace, name));
            }
            // A ':' after a non-numeric prefix is reserved and must have
            // been escaped.
            return Err(StatusCode::BadNodeIdInvalid);
        }
        Ok(make_name(default_namespace, first))
    }

    fn parse_element(
        &mut self,
        resolver: &ReferenceTypeResolver,
    ) -> Result<RelativePathElement, StatusCode> {
        let (reference_type_id, is_inverse, include_subtypes) = match self.chars.next() {
            Some('/') => (ReferenceTypeId::HierarchicalReferences.into(), false, true),
            Some('.') => (ReferenceTypeId::Aggregates.into(), false, true),
            Some('<') => {
                let mut include_subtypes = true;
                let mut is_inverse = false;
                if self.chars.peek() == Some(&'#') {
                    self.chars.next();
                    include_subtypes = false;
                }
                if self.chars.peek() == Some(&'!') {
                    self.chars.next();
                    is_inverse = true;
                }
                let name = self.read_qualified_name(&['>'], 0)?;
                if self.chars.next() != Some('>') {
                    return Err(StatusCode::BadNodeIdInvalid);
                }
                let id = resolver(name.namespace_index, name.name.as_ref())
                    .ok_or(StatusCode::BadNodeIdUnknown)?;
                (id, is_inverse, include_subtypes)
            }
            _ => return Err(StatusCode::BadNodeIdInvalid),
        };

        let target_name = self.read_qualified_name(&['/', '.', '<'], 0)?;
        Ok(RelativePathElement {
            reference_type_id,
            is_inverse,
            include_subtypes,
            target_name,
        })
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }
}

fn make_name(namespace_index: u16, name: String) -> QualifiedName {
    if name.is_empty() {
        QualifiedName::null()
    } else {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }
}

impl RelativePath {
    /// Parse the text form of a relative path. `resolver` maps explicit
    /// `<Name>` reference specifiers to node ids.
    pub fn parse(s: &str, resolver: &ReferenceTypeResolver) -> Result<RelativePath, StatusCode> {
        let mut parser = Parser::new(s);
        let mut elements = Vec::new();
        while !parser.at_end() {
            elements.push(parser.parse_element(resolver)?);
        }
        if elements.is_empty() {
            return Err(StatusCode::BadNodeIdInvalid);
        }
        Ok(RelativePath {
            elements: Some(elements),
        })
    }
}

fn escape_name(name: &str, out: &mut String) {
    for c in name.chars() {
        if RESERVED_CHARS.contains(c) {
            out.push('&');
        }
        out.push(c);
    }
}

impl fmt::Display for RelativePathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        match self.reference_type_id.as_reference_type_id() {
            Ok(ReferenceTypeId::HierarchicalReferences) if !self.is_inverse && self.include_subtypes => {
                out.push('/');
            }
            Ok(ReferenceTypeId::Aggregates) if !self.is_inverse && self.include_subtypes => {
                out.push('.');
            }
            id => {
                out.push('<');
                if !self.include_subtypes {
                    out.push('#');
                }
                if self.is_inverse {
                    out.push('!');
                }
                match id {
                    Ok(known) => escape_name(&format!("{:?}", known), &mut out),
                    Err(_) => escape_name(&self.reference_type_id.to_string(), &mut out),
                }
                out.push('>');
            }
        }
        if !self.target_name.name.is_null() {
            if self.target_name.namespace_index != 0 {
                out.push_str(&format!("{}:", self.target_name.namespace_index));
            }
            escape_name(self.target_name.name.as_ref(), &mut out);
        }
        write!(f, "{}", out)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(elements) = &self.elements {
            for element in elements {
                write!(f, "{}", element)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{standard_reference_type_resolver, RESERVED_CHARS};
    use crate::node_ids::ReferenceTypeId;
    use crate::qualified_name::QualifiedName;
    use crate::service::RelativePath;

    fn parse(s: &str) -> RelativePath {
        RelativePath::parse(s, &standard_reference_type_resolver).unwrap()
    }

    #[test]
    fn simple_path() {
        let path = parse("/0:ServerStatus.0:CurrentTime");
        let elements = path.elements.as_ref().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(
            elements[0].reference_type_id,
            ReferenceTypeId::HierarchicalReferences
        );
        assert!(elements[0].include_subtypes);
        assert!(!elements[0].is_inverse);
        assert_eq!(elements[0].target_name, QualifiedName::new(0, "ServerStatus"));
        assert_eq!(elements[1].reference_type_id, ReferenceTypeId::Aggregates);
        assert_eq!(elements[1].target_name, QualifiedName::new(0, "CurrentTime"));
    }

    #[test]
    fn unknown_reference_type_fails_resolution() {
        // Namespace 2 reference types are not known to the standard
        // resolver.
        assert!(
            RelativePath::parse("<#!2:MyReftype>2:Blah", &standard_reference_type_resolver)
                .is_err()
        );
    }

    #[test]
    fn explicit_standard_reference_type() {
        let path = parse("<!HasChild>Truck");
        let elements = path.elements.as_ref().unwrap();
        assert_eq!(elements[0].reference_type_id, ReferenceTypeId::HasChild);
        assert!(elements[0].is_inverse);
        assert!(elements[0].include_subtypes);
        assert_eq!(elements[0].target_name, QualifiedName::new(0, "Truck"));

        let path = parse("<#HasComponent>1:Wheel");
        let elements = path.elements.as_ref().unwrap();
        assert!(!elements[0].include_subtypes);
        assert_eq!(elements[0].target_name, QualifiedName::new(1, "Wheel"));
    }

    #[test]
    fn empty_final_target_name() {
        let path = parse("/2:Block&.Output<HasProperty>");
        let elements = path.elements.as_ref().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].target_name, QualifiedName::new(2, "Block.Output"));
        assert_eq!(elements[1].reference_type_id, ReferenceTypeId::HasProperty);
        assert!(elements[1].target_name.is_null());
    }

    #[test]
    fn every_reserved_char_escapes() {
        for c in RESERVED_CHARS.chars() {
            let s = format!("/1:x&{}y", c);
            let path = parse(&s);
            let elements = path.elements.as_ref().unwrap();
            assert_eq!(
                elements[0].target_name.name.as_ref(),
                format!("x{}y", c),
                "escape of {:?} failed",
                c
            );
            assert_eq!(elements[0].target_name.namespace_index, 1);
        }
    }

    #[test]
    fn unicode_passes_unescaped() {
        let path = parse("/3:Мотор№4");
        let elements = path.elements.as_ref().unwrap();
        assert_eq!(elements[0].target_name, QualifiedName::new(3, "Мотор№4"));
    }

    #[test]
    fn unescaped_reserved_in_name_is_rejected() {
        assert!(RelativePath::parse("/1:x:y", &standard_reference_type_resolver).is_err());
        assert!(RelativePath::parse("", &standard_reference_type_resolver).is_err());
        assert!(RelativePath::parse("/x#y", &standard_reference_type_resolver).is_err());
    }

    #[test]
    fn round_trip_display() {
        for s in ["/0:ServerStatus.0:CurrentTime", "<!HasChild>2:Truck", "/1:x&/y"] {
            let path = parse(s);
            assert_eq!(parse(&path.to_string()), path);
        }
    }
}
