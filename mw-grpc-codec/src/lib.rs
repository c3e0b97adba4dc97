// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./coding_test.rs"]
mod coding_test;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

// Compression byte + 4 message size bytes.
// See https://github.com/grpc/grpc/blob/master/doc/PROTOCOL-HTTP2.md#requests for an explanation
// of the gRPC wire format.
pub const GRPC_MESSAGE_PREFIX_LEN: usize = 5;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("A serialization error occurred: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Unsupported frame flags: {0}")]
  UnsupportedFlags(u8),
  #[error("Message of {0} bytes exceeds the maximum frame size")]
  MessageTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

//
// Encoder
//

// Converts messages into gRPC data frames. Messages are carried as JSON payloads with an
// uncompressed frame prefix.
#[derive(Debug)]
pub struct Encoder<MessageType: Serialize> {
  _type: PhantomData<MessageType>,
}

impl<MessageType: Serialize> Default for Encoder<MessageType> {
  fn default() -> Self {
    Self { _type: PhantomData }
  }
}

impl<MessageType: Serialize> Encoder<MessageType> {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  // Serialize the message then prefix it with the compression byte and the length in big endian
  // (the default for BytesMut).
  pub fn encode(&mut self, message: &MessageType) -> Result<Bytes> {
    let payload = serde_json::to_vec(message)?;
    let length =
      u32::try_from(payload.len()).map_err(|_| Error::MessageTooLarge(payload.len()))?;

    let mut buffer = BytesMut::with_capacity(GRPC_MESSAGE_PREFIX_LEN + payload.len());
    buffer.put_u8(0);
    buffer.put_u32(length);
    buffer.extend_from_slice(&payload);
    Ok(buffer.freeze())
  }
}

//
// Decoder
//

// Incremental decoder for a stream of gRPC data frames. Incoming data can be fed in arbitrary
// chunks; complete messages are emitted as they become available and partial frames are buffered
// until the rest arrives.
#[derive(Debug)]
pub struct Decoder<MessageType: DeserializeOwned> {
  buffer: BytesMut,
  _type: PhantomData<MessageType>,
}

impl<MessageType: DeserializeOwned> Default for Decoder<MessageType> {
  fn default() -> Self {
    Self {
      buffer: BytesMut::new(),
      _type: PhantomData,
    }
  }
}

impl<MessageType: DeserializeOwned> Decoder<MessageType> {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn decode_data(&mut self, data: &[u8]) -> Result<Vec<MessageType>> {
    self.buffer.extend_from_slice(data);

    let mut messages = Vec::new();
    loop {
      if self.buffer.len() < GRPC_MESSAGE_PREFIX_LEN {
        break;
      }

      // Compressed frames are never produced by our encoder so reject them outright rather than
      // silently misreading the payload.
      let flags = self.buffer[0];
      if flags != 0 {
        return Err(Error::UnsupportedFlags(flags));
      }

      let length = u32::from_be_bytes([
        self.buffer[1],
        self.buffer[2],
        self.buffer[3],
        self.buffer[4],
      ]) as usize;
      if self.buffer.len() < GRPC_MESSAGE_PREFIX_LEN + length {
        break;
      }

      self.buffer.advance(GRPC_MESSAGE_PREFIX_LEN);
      let payload = self.buffer.split_to(length);
      messages.push(serde_json::from_slice(&payload)?);
    }

    Ok(messages)
  }
}
