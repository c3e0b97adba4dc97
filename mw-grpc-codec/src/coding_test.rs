// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::{Decoder, Encoder, Error, GRPC_MESSAGE_PREFIX_LEN};
use assert_matches::assert_matches;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
struct TestMessage {
  name: String,
  count: u32,
}

fn test_message(name: &str, count: u32) -> TestMessage {
  TestMessage {
    name: name.to_string(),
    count,
  }
}

#[test]
fn single_frame() {
  let mut encoder = Encoder::new();
  let frame = encoder.encode(&test_message("hello", 1)).unwrap();
  assert_eq!(0, frame[0]);
  assert_eq!(
    (frame.len() - GRPC_MESSAGE_PREFIX_LEN) as u32,
    u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]])
  );

  let mut decoder: Decoder<TestMessage> = Decoder::new();
  assert_eq!(
    vec![test_message("hello", 1)],
    decoder.decode_data(&frame).unwrap()
  );
}

#[test]
fn split_delivery() {
  let mut encoder = Encoder::new();
  let frame = encoder.encode(&test_message("partial", 42)).unwrap();

  let mut decoder: Decoder<TestMessage> = Decoder::new();
  // Every prefix short of the full frame yields nothing.
  assert!(decoder.decode_data(&frame[.. 3]).unwrap().is_empty());
  assert!(decoder.decode_data(&frame[3 .. 7]).unwrap().is_empty());
  assert_eq!(
    vec![test_message("partial", 42)],
    decoder.decode_data(&frame[7 ..]).unwrap()
  );
}

#[test]
fn multiple_frames_in_one_chunk() {
  let mut encoder = Encoder::new();
  let mut data = encoder.encode(&test_message("first", 1)).unwrap().to_vec();
  data.extend_from_slice(&encoder.encode(&test_message("second", 2)).unwrap());

  let mut decoder: Decoder<TestMessage> = Decoder::new();
  assert_eq!(
    vec![test_message("first", 1), test_message("second", 2)],
    decoder.decode_data(&data).unwrap()
  );
}

#[test]
fn compressed_frames_are_rejected() {
  let mut encoder = Encoder::new();
  let mut frame = encoder.encode(&test_message("hello", 1)).unwrap().to_vec();
  frame[0] = 1;

  let mut decoder: Decoder<TestMessage> = Decoder::new();
  assert_matches!(
    decoder.decode_data(&frame),
    Err(Error::UnsupportedFlags(1))
  );
}

#[test]
fn invalid_payload() {
  let mut data = vec![0, 0, 0, 0, 2];
  data.extend_from_slice(b"{]");

  let mut decoder: Decoder<TestMessage> = Decoder::new();
  assert_matches!(decoder.decode_data(&data), Err(Error::Serialization(_)));
}
