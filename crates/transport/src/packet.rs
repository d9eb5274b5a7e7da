use crate::error::SyncError;

/// A payload tagged with the channel it travels on.
///
/// Wire layout: `u16` BE channel length, channel bytes (UTF-8), `u32` BE
/// payload length, payload bytes. Trailing bytes are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPacket {
    pub channel: String,
    pub payload: Vec<u8>,
}

impl SyncPacket {
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        let channel_len = u16::try_from(self.channel.len()).map_err(|_| {
            SyncError::Framing(format!("channel name too long: {}", self.channel.len()))
        })?;
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            SyncError::Framing(format!("payload too large: {}", self.payload.len()))
        })?;

        let mut buf = Vec::with_capacity(6 + self.channel.len() + self.payload.len());
        buf.extend_from_slice(&channel_len.to_be_bytes());
        buf.extend_from_slice(self.channel.as_bytes());
        buf.extend_from_slice(&payload_len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, SyncError> {
        let (len, rest) = take::<2>(data, "channel length")?;
        let (channel, rest) = take_slice(rest, u16::from_be_bytes(len) as usize, "channel")?;
        let channel = std::str::from_utf8(channel)
            .map_err(|e| SyncError::Framing(format!("channel is not UTF-8: {e}")))?;
        let (len, rest) = take::<4>(rest, "payload length")?;
        let (payload, rest) = take_slice(rest, u32::from_be_bytes(len) as usize, "payload")?;
        if !rest.is_empty() {
            return Err(SyncError::Framing(format!(
                "{} trailing bytes after payload",
                rest.len()
            )));
        }
        Ok(Self::new(channel, payload.to_vec()))
    }
}

fn take<'a, const N: usize>(data: &'a [u8], what: &str) -> Result<([u8; N], &'a [u8]), SyncError> {
    let (head, rest) = take_slice(data, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

fn take_slice<'a>(
    data: &'a [u8],
    len: usize,
    what: &str,
) -> Result<(&'a [u8], &'a [u8]), SyncError> {
    data.split_at_checked(len).ok_or_else(|| {
        SyncError::Framing(format!("truncated {what}: need {len}, have {}", data.len()))
    })
}
