//! A minimal event representation plus the where-clause evaluation and
//! select-clause projection applied by event monitored items.

use uastack_types::{
    encoding::DecodingOptions, AttributeId, ByteString, ContentFilter, ContentFilterElement,
    DateTime, ExtensionObjectBody, FilterOperator, LiteralOperand, LocalizedText, NodeId,
    ObjectId, ObjectTypeId, QualifiedName, SimpleAttributeOperand, UAString, Variant,
};

/// An event raised by a node. Fields are addressed by browse path, the
/// same way select clauses address them.
#[derive(Debug, Clone)]
pub struct Event {
    /// The event type, a subtype of BaseEventType.
    pub type_id: NodeId,
    /// The node the event originated from.
    pub source_node: NodeId,
    /// Field values by browse path.
    fields: Vec<(Vec<QualifiedName>, Variant)>,
}

fn path(name: &str) -> Vec<QualifiedName> {
    vec![QualifiedName::new(0, name)]
}

impl Event {
    /// A base event with the mandatory BaseEventType fields filled in.
    pub fn new(
        type_id: impl Into<NodeId>,
        source_node: impl Into<NodeId>,
        source_name: &str,
        message: &str,
        severity: u16,
    ) -> Event {
        let type_id = type_id.into();
        let source_node = source_node.into();
        let event_id: ByteString = uastack_types::Guid::new().as_bytes().as_slice().into();
        let fields = vec![
            (path("EventId"), Variant::ByteString(event_id)),
            (path("EventType"), Variant::from(type_id.clone())),
            (path("SourceNode"), Variant::from(source_node.clone())),
            (path("SourceName"), Variant::String(source_name.into())),
            (path("Time"), Variant::from(DateTime::now())),
            (path("ReceiveTime"), Variant::from(DateTime::now())),
            (
                path("Message"),
                Variant::from(LocalizedText::from(message)),
            ),
            (path("Severity"), Variant::UInt16(severity)),
        ];
        Event {
            type_id,
            source_node,
            fields,
        }
    }

    /// Set or replace a field value.
    pub fn set_field(&mut self, browse_path: Vec<QualifiedName>, value: impl Into<Variant>) {
        let value = value.into();
        if let Some(entry) = self.fields.iter_mut().find(|(p, _)| *p == browse_path) {
            entry.1 = value;
        } else {
            self.fields.push((browse_path, value));
        }
    }

    /// The value of a field, `Empty` when absent.
    pub fn get_field(&self, browse_path: &[QualifiedName]) -> Variant {
        self.fields
            .iter()
            .find(|(p, _)| p == browse_path)
            .map(|(_, v)| v.clone())
            .unwrap_or(Variant::Empty)
    }

    /// Project one select clause. An empty browse path with the NodeId
    /// attribute selects the condition id, which plain events do not have.
    pub fn select(&self, clause: &SimpleAttributeOperand) -> Variant {
        let Some(browse_path) = &clause.browse_path else {
            return Variant::Empty;
        };
        if clause.attribute_id != AttributeId::Value as u32 {
            return Variant::Empty;
        }
        self.get_field(browse_path)
    }

    /// Evaluate the where clause. An empty filter passes everything.
    pub fn passes_where_clause(&self, filter: &ContentFilter) -> bool {
        let Some(elements) = &filter.elements else {
            return true;
        };
        if elements.is_empty() {
            return true;
        }
        // Element 0 is the root of the expression tree.
        matches!(
            self.evaluate_element(elements, 0, 0),
            Some(Variant::Boolean(true))
        )
    }

    fn resolve_operand(
        &self,
        elements: &[ContentFilterElement],
        operand: &uastack_types::ExtensionObject,
        depth: u32,
    ) -> Option<Variant> {
        let options = DecodingOptions::minimal();
        match operand.object_id() {
            Some(ObjectId::LiteralOperand_Encoding_DefaultBinary) => operand
                .decode_inner::<LiteralOperand>(&options)
                .ok()
                .map(|l| l.value),
            Some(ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary) => operand
                .decode_inner::<SimpleAttributeOperand>(&options)
                .ok()
                .map(|o| self.select(&o)),
            Some(ObjectId::ElementOperand_Encoding_DefaultBinary) => {
                // The element operand body is just the target index.
                let ExtensionObjectBody::ByteString(bytes) = &operand.body else {
                    return None;
                };
                let slice = bytes.as_slice();
                if slice.len() < 4 {
                    return None;
                }
                let index = u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]);
                self.evaluate_element(elements, index as usize, depth + 1)
            }
            _ => None,
        }
    }

    fn evaluate_element(
        &self,
        elements: &[ContentFilterElement],
        index: usize,
        depth: u32,
    ) -> Option<Variant> {
        if depth > 16 {
            return None;
        }
        let element = elements.get(index)?;
        let operands = element.filter_operands.as_deref().unwrap_or(&[]);
        let resolve =
            |i: usize| -> Option<Variant> { self.resolve_operand(elements, operands.get(i)?, depth) };

        let result = match element.filter_operator {
            FilterOperator::Equals => Variant::Boolean(variants_equal(&resolve(0)?, &resolve(1)?)),
            FilterOperator::IsNull => Variant::Boolean(resolve(0)?.is_empty()),
            FilterOperator::Not => match resolve(0)? {
                Variant::Boolean(v) => Variant::Boolean(!v),
                _ => return None,
            },
            FilterOperator::And => Variant::Boolean(
                as_bool(&resolve(0)?)? && as_bool(&resolve(1)?)?,
            ),
            FilterOperator::Or => Variant::Boolean(
                as_bool(&resolve(0)?)? || as_bool(&resolve(1)?)?,
            ),
            FilterOperator::GreaterThan => compare(&resolve(0)?, &resolve(1)?, |o| o > 0.0)?,
            FilterOperator::LessThan => compare(&resolve(0)?, &resolve(1)?, |o| o < 0.0)?,
            FilterOperator::GreaterThanOrEqual => {
                compare(&resolve(0)?, &resolve(1)?, |o| o >= 0.0)?
            }
            FilterOperator::LessThanOrEqual => compare(&resolve(0)?, &resolve(1)?, |o| o <= 0.0)?,
            FilterOperator::OfType => {
                let Some(Variant::NodeId(wanted)) = resolve(0) else {
                    return None;
                };
                // Without the full type hierarchy at hand the filter
                // accepts exact matches and the base event type.
                Variant::Boolean(
                    self.type_id == *wanted || *wanted == ObjectTypeId::BaseEventType,
                )
            }
            _ => return None,
        };
        Some(result)
    }
}

fn as_bool(value: &Variant) -> Option<bool> {
    match value {
        Variant::Boolean(v) => Some(*v),
        _ => None,
    }
}

fn variants_equal(a: &Variant, b: &Variant) -> bool {
    if a == b {
        return true;
    }
    // Numbers of different widths compare by value.
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn compare(a: &Variant, b: &Variant, check: impl Fn(f64) -> bool) -> Option<Variant> {
    match (a.as_f64(), b.as_f64()) {
        (Some(a), Some(b)) => Some(Variant::Boolean(check(a - b))),
        _ => None,
    }
}

/// Helper building the select clauses monitoring tools commonly request:
/// one clause per named BaseEventType field.
pub fn base_event_select_clauses(names: &[&str]) -> Vec<SimpleAttributeOperand> {
    names
        .iter()
        .map(|name| SimpleAttributeOperand {
            type_definition_id: ObjectTypeId::BaseEventType.into(),
            browse_path: Some(vec![QualifiedName::new(0, *name)]),
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use uastack_types::{
        ContentFilter, ContentFilterElement, ExtensionObject, FilterOperator, LiteralOperand,
        ObjectTypeId, QualifiedName, Variant,
    };

    use super::{base_event_select_clauses, Event};

    fn test_event() -> Event {
        Event::new(ObjectTypeId::BaseEventType, (1u16, 100u32), "source", "hello", 500)
    }

    #[test]
    fn select_projects_fields() {
        let event = test_event();
        let clauses = base_event_select_clauses(&["Severity", "Message", "NoSuchField"]);
        assert_eq!(event.select(&clauses[0]), Variant::UInt16(500));
        assert!(matches!(event.select(&clauses[1]), Variant::LocalizedText(_)));
        assert_eq!(event.select(&clauses[2]), Variant::Empty);
    }

    #[test]
    fn where_clause_severity_threshold() {
        let event = test_event();
        let severity_clause = &base_event_select_clauses(&["Severity"])[0];
        let filter = |threshold: u16| ContentFilter {
            elements: Some(vec![ContentFilterElement {
                filter_operator: FilterOperator::GreaterThan,
                filter_operands: Some(vec![
                    ExtensionObject::from_message(severity_clause),
                    ExtensionObject::from_message(&LiteralOperand {
                        value: Variant::UInt16(threshold),
                    }),
                ]),
            }]),
        };
        assert!(event.passes_where_clause(&filter(100)));
        assert!(!event.passes_where_clause(&filter(800)));
    }

    #[test]
    fn empty_where_clause_passes() {
        let event = test_event();
        assert!(event.passes_where_clause(&ContentFilter { elements: None }));
    }

    #[test]
    fn malformed_where_clause_rejects() {
        let event = test_event();
        let filter = ContentFilter {
            elements: Some(vec![ContentFilterElement {
                filter_operator: FilterOperator::Equals,
                filter_operands: None,
            }]),
        };
        assert!(!event.passes_where_clause(&filter));
    }

    #[test]
    fn of_type_matches() {
        let event = test_event();
        let filter = ContentFilter {
            elements: Some(vec![ContentFilterElement {
                filter_operator: FilterOperator::OfType,
                filter_operands: Some(vec![ExtensionObject::from_message(&LiteralOperand {
                    value: Variant::from(uastack_types::NodeId::from(
                        ObjectTypeId::BaseEventType,
                    )),
                })]),
            }]),
        };
        assert!(event.passes_where_clause(&filter));
    }
}
