//! The service request/response structures and their supporting types.

mod attributes;
mod history;
mod method;
mod monitored_item;
mod secure_channel;
mod session;
mod subscription;
mod support;
mod view;

pub use attributes::*;
pub use history::*;
pub use method::*;
pub use monitored_item::*;
pub use secure_channel::*;
pub use session::*;
pub use subscription::*;
pub use support::*;
pub use view::*;

#[cfg(test)]
mod tests {
    use crate::{
        data_value::DataValue,
        date_time::DateTime,
        encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions},
        extension_object::ExtensionObject,
        request_header::RequestHeader,
        status_code::StatusCode,
        variant::Variant,
    };

    use super::*;

    fn round_trip<T>(value: &T) -> T
    where
        T: BinaryEncodable + BinaryDecodable + PartialEq + std::fmt::Debug,
    {
        let bytes = value.encode_to_vec();
        assert_eq!(bytes.len(), value.byte_len());
        let mut stream = std::io::Cursor::new(bytes);
        T::decode(&mut stream, &DecodingOptions::default()).unwrap()
    }

    #[test]
    fn create_session_request() {
        let request = CreateSessionRequest {
            request_header: RequestHeader::dummy(),
            client_description: ApplicationDescription {
                application_uri: "urn:client".into(),
                application_name: "client".into(),
                application_type: ApplicationType::Client,
                ..Default::default()
            },
            endpoint_url: "opc.tcp://localhost:4840/".into(),
            session_name: "session".into(),
            requested_session_timeout: 30_000.0,
            max_response_message_size: 65536,
            ..Default::default()
        };
        assert_eq!(round_trip(&request), request);
    }

    #[test]
    fn publish_response_with_notification() {
        let notification = NotificationMessage::data_change(
            42,
            DateTime::now(),
            vec![MonitoredItemNotification {
                client_handle: 7,
                value: DataValue::new_now(Variant::Double(3.5)),
            }],
            Vec::new(),
        );
        let response = PublishResponse {
            response_header: Default::default(),
            subscription_id: 12,
            available_sequence_numbers: Some(vec![41, 42]),
            more_notifications: false,
            notification_message: notification,
            results: Some(vec![StatusCode::Good]),
            diagnostic_infos: None,
        };
        let decoded = round_trip(&response);
        assert_eq!(decoded, response);

        // The payload decodes back out of its extension object.
        let payload = decoded.notification_message.notification_data.unwrap();
        let data_change = payload[0]
            .decode_inner::<DataChangeNotification>(&DecodingOptions::default())
            .unwrap();
        assert_eq!(
            data_change.monitored_items.unwrap()[0].value.value,
            Some(Variant::Double(3.5))
        );
    }

    #[test]
    fn status_change_notification_payload() {
        let message =
            NotificationMessage::status_change(5, DateTime::now(), StatusCode::BadTimeout);
        assert!(!message.is_keep_alive());
        let decoded = round_trip(&message);
        let payload = decoded.notification_data.unwrap();
        let status_change = payload[0]
            .decode_inner::<StatusChangeNotification>(&DecodingOptions::default())
            .unwrap();
        assert_eq!(status_change.status, StatusCode::BadTimeout);
    }

    #[test]
    fn unknown_enum_value_fails_decoding() {
        let mut bytes = Vec::new();
        crate::encoding::write_i32(&mut bytes, 99).unwrap();
        let mut stream = std::io::Cursor::new(bytes);
        assert!(TimestampsToReturn::decode(&mut stream, &DecodingOptions::default()).is_err());
    }

    #[test]
    fn monitoring_filter_round_trips_through_extension_object() {
        let filter = DataChangeFilter {
            trigger: DataChangeTrigger::StatusValueTimestamp,
            deadband_type: DeadbandType::Absolute as u32,
            deadband_value: 0.25,
        };
        let object = ExtensionObject::from_message(&filter);
        let decoded = object
            .decode_inner::<DataChangeFilter>(&DecodingOptions::default())
            .unwrap();
        assert_eq!(decoded, filter);
        // The wrong target type is rejected by its type id.
        assert!(object
            .decode_inner::<EventFilter>(&DecodingOptions::default())
            .is_err());
    }
}
