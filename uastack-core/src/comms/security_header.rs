//! The two headers between a chunk's fixed header and its body: the
//! security header identifying the keys in force, and the sequence
//! header ordering the chunk within its channel.

use std::io::{Read, Write};

use uastack_types::{
    encoding::{
        read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
    },
    ByteString, UAString,
};

use super::{message_chunk::MessageChunkType, security_policy::SecurityPolicy};

/// Orders a chunk within its channel and ties it to a request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SequenceHeader {
    /// Monotonic per-channel chunk sequence number.
    pub sequence_number: u32,
    /// Correlates the chunks of one request with its response.
    pub request_id: u32,
}

impl BinaryEncodable for SequenceHeader {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.sequence_number)?;
        write_u32(stream, self.request_id)
    }
}

impl BinaryDecodable for SequenceHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SequenceHeader {
            sequence_number: read_u32(stream)?,
            request_id: read_u32(stream)?,
        })
    }
}

/// Names the token whose symmetric keys protect a MSG or CLO chunk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymmetricSecurityHeader {
    /// The id of the channel token in force.
    pub token_id: u32,
}

impl BinaryEncodable for SymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        write_u32(stream, self.token_id)
    }
}

impl BinaryDecodable for SymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(SymmetricSecurityHeader {
            token_id: read_u32(stream)?,
        })
    }
}

/// Names the policy and certificates securing an OPN chunk, which is
/// exchanged before any symmetric keys exist.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymmetricSecurityHeader {
    /// The security policy URI.
    pub security_policy_uri: UAString,
    /// DER certificate of the sender, null on the None policy.
    pub sender_certificate: ByteString,
    /// Thumbprint of the receiver's certificate, null on the None policy.
    pub receiver_certificate_thumbprint: ByteString,
}

impl Default for AsymmetricSecurityHeader {
    // The unsecured form: policy None, no certificates.
    fn default() -> Self {
        AsymmetricSecurityHeader {
            security_policy_uri: SecurityPolicy::None.to_uri().into(),
            sender_certificate: ByteString::null(),
            receiver_certificate_thumbprint: ByteString::null(),
        }
    }
}

impl BinaryEncodable for AsymmetricSecurityHeader {
    fn byte_len(&self) -> usize {
        self.security_policy_uri.byte_len()
            + self.sender_certificate.byte_len()
            + self.receiver_certificate_thumbprint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.security_policy_uri.encode(stream)?;
        self.sender_certificate.encode(stream)?;
        self.receiver_certificate_thumbprint.encode(stream)
    }
}

impl BinaryDecodable for AsymmetricSecurityHeader {
    fn decode<S: Read + ?Sized>(stream: &mut S, options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(AsymmetricSecurityHeader {
            security_policy_uri: UAString::decode(stream, options)?,
            sender_certificate: ByteString::decode(stream, options)?,
            receiver_certificate_thumbprint: ByteString::decode(stream, options)?,
        })
    }
}

/// The security header of a chunk; which form it takes follows from the
/// chunk type.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityHeader {
    /// Asymmetric form, OPN chunks only.
    Asymmetric(AsymmetricSecurityHeader),
    /// Symmetric form, everything else.
    Symmetric(SymmetricSecurityHeader),
}

impl SecurityHeader {
    /// Decode the form `message_type` prescribes.
    pub fn decode_for<S: Read + ?Sized>(
        message_type: MessageChunkType,
        stream: &mut S,
        options: &DecodingOptions,
    ) -> EncodingResult<SecurityHeader> {
        if message_type.is_open_secure_channel() {
            AsymmetricSecurityHeader::decode(stream, options).map(SecurityHeader::Asymmetric)
        } else {
            SymmetricSecurityHeader::decode(stream, options).map(SecurityHeader::Symmetric)
        }
    }
}

impl BinaryEncodable for SecurityHeader {
    fn byte_len(&self) -> usize {
        match self {
            SecurityHeader::Asymmetric(header) => header.byte_len(),
            SecurityHeader::Symmetric(header) => header.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            SecurityHeader::Asymmetric(header) => header.encode(stream),
            SecurityHeader::Symmetric(header) => header.encode(stream),
        }
    }
}
