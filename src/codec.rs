//! Body codecs: the [`Decoder`] contract for request bodies and the
//! [`Encoder`] / decorator chain for response bodies.
//!
//! # Decoding
//!
//! A decoder reads the request body and hands a type-erased `serde`
//! deserializer to a [`DecodeTarget`]. The target is built by
//! [`Request::parse_body_into`](crate::Request::parse_body_into) and knows the
//! concrete type the handler asked for; the decoder only knows the wire format.
//!
//! # Encoding
//!
//! A response starts with [`base_encoder`], which refuses everything. Each
//! [`Response::use_encoder_decorator`](crate::Response::use_encoder_decorator)
//! call wraps the current encoder in a new one:
//!
//! ```text
//! encoder = d_k( d_{k-1}( … d_1(base) … ) )
//! ```
//!
//! A decorator serializes the value itself when the response `Content-Type`
//! is its own, and delegates to the encoder it wraps otherwise. The last
//! decorator installed is asked first.

use std::io::{BufReader, Read};

use http::StatusCode;
use http::header::CONTENT_TYPE;

use crate::error::{BoxError, TaggedError};
use crate::response::{ContentType, ResponseSink};

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Receives the erased deserializer a [`Decoder`] builds over the body.
pub type DecodeTarget<'a> = dyn for<'de> FnMut(&mut dyn erased_serde::Deserializer<'de>) -> Result<(), erased_serde::Error>
    + 'a;

/// Parses a request body in one wire format.
///
/// Implemented for any function with the right signature, so
/// [`decode_json`] and [`decode_xml`] can be installed directly.
pub trait Decoder: Send + Sync {
    fn decode(&self, body: &mut dyn Read, target: &mut DecodeTarget<'_>) -> Result<(), BoxError>;
}

impl<F> Decoder for F
where
    F: Fn(&mut dyn Read, &mut DecodeTarget<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn decode(&self, body: &mut dyn Read, target: &mut DecodeTarget<'_>) -> Result<(), BoxError> {
        self(body, target)
    }
}

/// Decodes a JSON body. Trailing non-whitespace after the value is an error.
pub fn decode_json(body: &mut dyn Read, target: &mut DecodeTarget<'_>) -> Result<(), BoxError> {
    let mut de = serde_json::Deserializer::from_reader(body);
    target(&mut <dyn erased_serde::Deserializer>::erase(&mut de))?;
    de.end()?;
    Ok(())
}

/// Decodes an XML body. The root element name is not checked.
pub fn decode_xml(body: &mut dyn Read, target: &mut DecodeTarget<'_>) -> Result<(), BoxError> {
    let mut de = quick_xml::de::Deserializer::from_reader(BufReader::new(body));
    target(&mut <dyn erased_serde::Deserializer>::erase(&mut de))?;
    Ok(())
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Writes a value into the response sink.
pub type Encoder =
    Box<dyn Fn(&mut ResponseSink, &dyn erased_serde::Serialize) -> Result<(), BoxError> + Send + Sync>;

/// A plain encoding function, paired with a content type by [`content_type_decorator`].
pub type EncodeFn = fn(&mut ResponseSink, &dyn erased_serde::Serialize) -> Result<(), BoxError>;

/// The innermost encoder of every response: fails with a `500` tagged
/// `unsupported Content-Type: <content type>`.
pub fn base_encoder() -> Encoder {
    Box::new(|sink: &mut ResponseSink, _value: &dyn erased_serde::Serialize| -> Result<(), BoxError> {
        let content_type = sink.header(CONTENT_TYPE).unwrap_or_default();
        Err(TaggedError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unsupported Content-Type: {content_type}"),
        )
        .into())
    })
}

/// Builds a decorator that claims `content_type` and delegates every other one.
///
/// A response `Content-Type` matches when it starts with `content_type`, so
/// parameters such as `; charset=utf-8` do not defeat the match.
pub fn content_type_decorator(
    content_type: &'static str,
    encode: EncodeFn,
) -> impl FnOnce(Encoder) -> Encoder + Send + Sync {
    move |next: Encoder| -> Encoder {
        Box::new(
            move |sink: &mut ResponseSink, value: &dyn erased_serde::Serialize| -> Result<(), BoxError> {
                let claimed = sink
                    .header(CONTENT_TYPE)
                    .is_some_and(|current| current.starts_with(content_type));
                if claimed { encode(sink, value) } else { next(sink, value) }
            },
        )
    }
}

/// Decorator serializing `application/json` responses.
pub fn json_encoder_decorator(next: Encoder) -> Encoder {
    content_type_decorator(ContentType::Json.as_str(), encode_json)(next)
}

/// Decorator serializing `application/xml` responses.
pub fn xml_encoder_decorator(next: Encoder) -> Encoder {
    content_type_decorator(ContentType::Xml.as_str(), encode_xml)(next)
}

pub fn encode_json(sink: &mut ResponseSink, value: &dyn erased_serde::Serialize) -> Result<(), BoxError> {
    serde_json::to_writer(&mut *sink, value)?;
    Ok(())
}

/// The root element is named after the serialized type.
pub fn encode_xml(sink: &mut ResponseSink, value: &dyn erased_serde::Serialize) -> Result<(), BoxError> {
    let xml = quick_xml::se::to_string(value)?;
    sink.write(xml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Account {
        username: String,
        email: String,
    }

    fn account() -> Account {
        Account { username: "John Doe".into(), email: "jd@example.com".into() }
    }

    fn decode_with<T: serde::de::DeserializeOwned>(decoder: &dyn Decoder, body: &[u8]) -> Result<T, BoxError> {
        let mut reader = body;
        let mut slot = None;
        decoder.decode(&mut reader, &mut |de| {
            slot = Some(erased_serde::deserialize::<T>(de)?);
            Ok(())
        })?;
        Ok(slot.expect("decoder called the target"))
    }

    #[test]
    fn json_decoder_fills_target() {
        let body = br#"{"username":"John Doe","email":"jd@example.com","password":"ignored"}"#;
        let decoded: Account = decode_with(&decode_json, body).unwrap();
        assert_eq!(decoded, account());
    }

    #[test]
    fn json_decoder_rejects_trailing_garbage() {
        let body = br#"{"username":"a","email":"b"} nope"#;
        assert!(decode_with::<Account>(&decode_json, body).is_err());
    }

    #[test]
    fn xml_decoder_fills_target() {
        let body = b"<Account><username>John Doe</username><email>jd@example.com</email></Account>";
        let decoded: Account = decode_with(&decode_xml, body).unwrap();
        assert_eq!(decoded, account());
    }

    #[test]
    fn json_round_trip_through_sink() {
        let mut sink = ResponseSink::new();
        sink.set_content_type(ContentType::Json);
        let encoder = json_encoder_decorator(base_encoder());
        encoder(&mut sink, &account()).unwrap();

        let decoded: Account = decode_with(&decode_json, sink.body()).unwrap();
        assert_eq!(decoded, account());
    }

    #[test]
    fn xml_round_trip_through_sink() {
        let mut sink = ResponseSink::new();
        sink.set_content_type(ContentType::Xml);
        let encoder = xml_encoder_decorator(base_encoder());
        encoder(&mut sink, &account()).unwrap();

        assert!(sink.body().starts_with(b"<Account>"));
        let decoded: Account = decode_with(&decode_xml, sink.body()).unwrap();
        assert_eq!(decoded, account());
    }

    #[test]
    fn base_encoder_reports_content_type() {
        let mut sink = ResponseSink::new();
        sink.set_content_type(ContentType::Csv);
        let err = base_encoder()(&mut sink, &account()).unwrap_err();

        let tagged = TaggedError::find(err.as_ref()).unwrap();
        assert_eq!(tagged.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(tagged.message(), "unsupported Content-Type: text/csv");
    }

    #[test]
    fn decorator_delegates_on_miss() {
        let mut sink = ResponseSink::new();
        sink.set_content_type(ContentType::Xml);
        let encoder = json_encoder_decorator(base_encoder());
        assert!(encoder(&mut sink, &account()).is_err());
        assert!(sink.body().is_empty());
    }

    #[test]
    fn decorator_matches_content_type_with_parameters() {
        let mut sink = ResponseSink::new();
        sink.set_header(CONTENT_TYPE, http::HeaderValue::from_static("application/json; charset=utf-8"));
        let encoder = json_encoder_decorator(base_encoder());
        encoder(&mut sink, &account()).unwrap();
        assert!(sink.body().starts_with(b"{"));
    }
}
