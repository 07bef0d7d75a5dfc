// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Riemann wire messages.
//!
//! Field numbers follow Riemann's `proto.proto`. Only the parts a client needs to submit events
//! and read acknowledgements are declared; unknown fields in responses are skipped by the decoder.

/// An attribute attached to an event.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct Attribute {
    #[prost(string, required, tag = "1")]
    pub key: String,
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}

/// A single monitoring event.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Event {
    /// Seconds since the Unix epoch.
    #[prost(int64, optional, tag = "1")]
    pub time: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub state: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub service: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub host: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
    #[prost(string, repeated, tag = "7")]
    pub tags: Vec<String>,
    #[prost(float, optional, tag = "8")]
    pub ttl: Option<f32>,
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<Attribute>,
    #[prost(int64, optional, tag = "10")]
    pub time_micros: Option<i64>,
    #[prost(sint64, optional, tag = "13")]
    pub metric_sint64: Option<i64>,
    #[prost(double, optional, tag = "14")]
    pub metric_d: Option<f64>,
    #[prost(float, optional, tag = "15")]
    pub metric_f: Option<f32>,
}

/// The envelope for both requests and acknowledgements.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Msg {
    #[prost(bool, optional, tag = "2")]
    pub ok: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub error: Option<String>,
    #[prost(message, repeated, tag = "6")]
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn test_decode_negative_ack() {
        // ok = false, error = "no"
        let bytes = [0x10, 0x00, 0x1a, 0x02, b'n', b'o'];
        let msg = Msg::decode(&bytes[..]).unwrap();
        assert_eq!(msg.ok, Some(false));
        assert_eq!(msg.error.as_deref(), Some("no"));
        assert!(msg.events.is_empty());
    }

    #[test]
    fn test_encode_event_fields() {
        let msg = Msg {
            events: vec![Event {
                host: Some("web-1".to_string()),
                attributes: vec![Attribute {
                    key: "k".to_string(),
                    value: Some("v".to_string()),
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let bytes = msg.encode_to_vec();
        let decoded = Msg::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.ok, None);
    }
}
