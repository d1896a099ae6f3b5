//! Streaming OpenPGP data packet writers
//!
//! Data packets are framed with partial body lengths, so the plaintext size
//! never has to be known up front and no layer buffers more than one partial
//! chunk.

use std::io::{self, Write};

use aes::Aes256;
use cfb_mode::cipher::KeyIvInit;
use cfb_mode::BufEncryptor;
use rand::RngCore;
use sha1::{Digest, Sha1};

/// Every non-final partial body chunk is 2^13 bytes.
const PARTIAL_CHUNK_POWER: u8 = 13;
pub const PARTIAL_CHUNK_SIZE: usize = 1 << PARTIAL_CHUNK_POWER;

pub const TAG_LITERAL_DATA: u8 = 11;
pub const TAG_SYM_ENCRYPTED_PROTECTED_DATA: u8 = 18;

const AES_BLOCK_SIZE: usize = 16;

/// Modification detection code packet header: tag 19, length 20.
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];

/// Body of a data packet written as a run of partial lengths plus one
/// definite-length tail.
#[derive(Debug)]
pub struct PartialBodyWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> PartialBodyWriter<W> {
    /// Write the new-format header for `tag` and begin the body.
    pub fn start(mut inner: W, tag: u8) -> io::Result<Self> {
        inner.write_all(&[0xC0 | tag])?;
        Ok(Self {
            inner,
            buf: Vec::with_capacity(PARTIAL_CHUNK_SIZE),
        })
    }

    fn emit_partial(&mut self) -> io::Result<()> {
        self.inner.write_all(&[0xE0 | PARTIAL_CHUNK_POWER])?;
        self.inner.write_all(&self.buf)?;
        self.buf.clear();
        Ok(())
    }

    /// Close the packet with the buffered tail and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        write_definite_length(&mut self.inner, self.buf.len())?;
        self.inner.write_all(&self.buf)?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for PartialBodyWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = data.len().min(PARTIAL_CHUNK_SIZE - self.buf.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == PARTIAL_CHUNK_SIZE {
            self.emit_partial()?;
        }
        Ok(n)
    }

    /// Partial chunks have a fixed size, so this only flushes what has
    /// already been framed.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn write_definite_length<W: Write>(w: &mut W, len: usize) -> io::Result<()> {
    if len < 192 {
        w.write_all(&[len as u8])
    } else if len < 8384 {
        let rest = len - 192;
        w.write_all(&[((rest >> 8) + 192) as u8, (rest & 0xFF) as u8])
    } else {
        let len = u32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "packet body too long"))?;
        w.write_all(&[0xFF])?;
        w.write_all(&len.to_be_bytes())
    }
}

/// AES-256 CFB encryption of a SEIPD v1 body with a trailing MDC.
///
/// Everything written is hashed and encrypted in place; the random prefix
/// goes out on construction and the MDC on [`SealingWriter::finish`].
pub struct SealingWriter<W: Write> {
    inner: W,
    cipher: BufEncryptor<Aes256>,
    mdc: Sha1,
    scratch: Vec<u8>,
}

impl<W: Write> SealingWriter<W> {
    pub fn new<R: RngCore>(inner: W, session_key: &[u8], rng: &mut R) -> io::Result<Self> {
        let cipher = BufEncryptor::<Aes256>::new_from_slices(session_key, &[0u8; AES_BLOCK_SIZE])
            .map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "session key has the wrong length")
            })?;

        let mut writer = Self {
            inner,
            cipher,
            mdc: Sha1::new(),
            scratch: Vec::new(),
        };

        // Random block, then its last two octets repeated.
        let mut prefix = [0u8; AES_BLOCK_SIZE + 2];
        rng.fill_bytes(&mut prefix[..AES_BLOCK_SIZE]);
        prefix[AES_BLOCK_SIZE] = prefix[AES_BLOCK_SIZE - 2];
        prefix[AES_BLOCK_SIZE + 1] = prefix[AES_BLOCK_SIZE - 1];
        writer.write_all(&prefix)?;

        Ok(writer)
    }

    /// Append the encrypted MDC packet and hand back the sink.
    pub fn finish(self) -> io::Result<W> {
        let Self {
            mut inner,
            mut cipher,
            mut mdc,
            ..
        } = self;

        mdc.update(MDC_HEADER);
        let mut trailer = MDC_HEADER.to_vec();
        trailer.extend_from_slice(&mdc.finalize());
        cipher.encrypt(&mut trailer);
        inner.write_all(&trailer)?;
        Ok(inner)
    }
}

impl<W: Write> Write for SealingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.mdc.update(data);
        self.scratch.clear();
        self.scratch.extend_from_slice(data);
        self.cipher.encrypt(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
