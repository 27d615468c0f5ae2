//! The framed transport: varint length prefixes, threshold-gated zlib and
//! AES-CFB8 over a TCP stream.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicI32, Ordering};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use redstone_buf::{BufError, ByteCursor};

use crate::crypto::{Cfb8Dec, Cfb8Enc};
use crate::error::NetError;

/// A connection to a server.
///
/// Each direction owns its socket half, its CFB8 state and a mutex: one
/// packet is fully framed before the next begins, and the byte-granular
/// cipher state is never touched concurrently. The compression threshold is
/// shared; it only changes during login while no other I/O is in flight.
pub struct Connection {
    reader: Mutex<ReadHalf>,
    writer: Mutex<WriteHalf>,
    compression: AtomicI32,
}

struct ReadHalf {
    socket: OwnedReadHalf,
    cipher: Option<Cfb8Dec>,
}

struct WriteHalf {
    socket: OwnedWriteHalf,
    cipher: Option<Cfb8Enc>,
}

impl Connection {
    pub async fn connect(host: &str, port: u16) -> Result<Self, NetError> {
        Ok(Self::from_stream(TcpStream::connect((host, port)).await?))
    }

    /// Wraps an already-established stream; the server side of the framing
    /// is identical, which the tests lean on.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: Mutex::new(ReadHalf {
                socket: read,
                cipher: None,
            }),
            writer: Mutex::new(WriteHalf {
                socket: write,
                cipher: None,
            }),
            compression: AtomicI32::new(-1),
        }
    }

    /// The active compression threshold, if compression is enabled.
    pub fn compression(&self) -> Option<i32> {
        let threshold = self.compression.load(Ordering::Acquire);
        (threshold >= 0).then_some(threshold)
    }

    pub fn set_compression(&self, threshold: i32) {
        self.compression.store(threshold, Ordering::Release);
    }

    /// Keys both directions with AES-128/CFB8, IV = key = secret. Everything
    /// sent or received from now on passes through the ciphers.
    pub async fn enable_encryption(&self, secret: &[u8; 16]) {
        let mut reader = self.reader.lock().await;
        reader.cipher = Some(Cfb8Dec::new(secret));
        drop(reader);
        let mut writer = self.writer.lock().await;
        writer.cipher = Some(Cfb8Enc::new(secret));
    }

    /// Frames and sends one packet: `varint(len) (varint(pid) payload)`,
    /// with the inner body zlib-compressed above the threshold and the whole
    /// frame encrypted when encryption is active.
    pub async fn send(&self, pid: i32, payload: &[u8]) -> Result<(), NetError> {
        let mut body = ByteCursor::new();
        body.write_varint32(pid);
        body.write_bytes(payload);
        let mut body = body.into_vec();

        if let Some(threshold) = self.compression() {
            let mut framed = ByteCursor::new();
            if (body.len() as i32) < threshold {
                framed.write_varint32(0);
                framed.write_bytes(&body);
            } else {
                framed.write_varint32(body.len() as i32);
                framed.write_bytes(&compress(&body)?);
            }
            body = framed.into_vec();
        }

        let mut frame = ByteCursor::new();
        frame.write_varint32(body.len() as i32);
        frame.write_bytes(&body);
        let mut bytes = frame.into_vec();

        let mut writer = self.writer.lock().await;
        if let Some(cipher) = &mut writer.cipher {
            cipher.apply(&mut bytes);
        }
        writer.socket.write_all(&bytes).await?;
        Ok(())
    }

    /// Receives one packet, returning its id and a cursor at the payload.
    pub async fn recv(&self) -> Result<(i32, ByteCursor), NetError> {
        let mut reader = self.reader.lock().await;

        let length = read_length(&mut reader).await?;
        if length < 0 {
            return Err(NetError::Buf(BufError::NegativeLength(length)));
        }
        let mut data = vec![0u8; length as usize];
        reader.socket.read_exact(&mut data).await?;
        if let Some(cipher) = &mut reader.cipher {
            cipher.apply(&mut data);
        }
        drop(reader);

        let mut buf = ByteCursor::from_vec(data);
        if let Some(threshold) = self.compression() {
            let declared = buf.read_varint32()?;
            if declared != 0 {
                if declared < threshold {
                    return Err(NetError::ThresholdViolation {
                        size: declared,
                        threshold,
                    });
                }
                let inflated = decompress(&buf.read_left())?;
                if inflated.len() != declared as usize {
                    return Err(NetError::LengthMismatch {
                        declared,
                        got: inflated.len(),
                    });
                }
                buf = ByteCursor::from_vec(inflated);
            }
        }

        let pid = buf.read_varint32()?;
        Ok((pid, buf))
    }

    /// Closes the socket; peers blocked in `recv` observe end of stream.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.socket.shutdown().await;
    }
}

/// Decodes the length varint one decrypted byte at a time; the frame length
/// itself is inside the cipher stream.
async fn read_length(reader: &mut ReadHalf) -> Result<i32, NetError> {
    let mut acc: u64 = 0;
    for it in 0..5 {
        let mut byte = [0u8; 1];
        reader.socket.read_exact(&mut byte).await?;
        if let Some(cipher) = &mut reader.cipher {
            cipher.apply(&mut byte);
        }
        acc |= u64::from(byte[0] & 0x7f) << (7 * it);
        if byte[0] & 0x80 == 0 {
            return Ok(acc as u32 as i32);
        }
    }
    Err(NetError::Buf(BufError::VarintTooLong { max_bytes: 5 }))
}

fn compress(data: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::new();
    decoder.read_to_end(&mut output)?;
    Ok(output)
}
