//! Metering feed (spec §4.7): the audio thread computes peak/RMS per block
//! and pushes them through a bounded non-blocking channel. The audio side
//! never allocates strings or formats anything — it only ever pushes plain
//! `MeterFrame` values; a full ring means the control side fell behind and
//! the oldest unread frame is simply lost, never blocking the render loop.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use strata_types::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterFrame {
    pub channel: ChannelId,
    pub peak_db: f32,
    pub rms_db: f32,
}

const SILENCE_FLOOR_DB: f32 = -96.0;

pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * amplitude.log10()).max(SILENCE_FLOOR_DB)
    }
}

pub fn measure_block(channel: ChannelId, l: &[f32], r: &[f32]) -> MeterFrame {
    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f32;
    let n = l.len().max(r.len()).max(1);
    for i in 0..l.len().max(r.len()) {
        let sl = l.get(i).copied().unwrap_or(0.0);
        let sr = r.get(i).copied().unwrap_or(0.0);
        peak = peak.max(sl.abs()).max(sr.abs());
        sum_sq += sl * sl + sr * sr;
    }
    let rms = (sum_sq / (2.0 * n as f32)).sqrt();
    MeterFrame {
        channel,
        peak_db: amplitude_to_db(peak),
        rms_db: amplitude_to_db(rms),
    }
}

pub struct MeterWriter {
    tx: Sender<MeterFrame>,
}

impl MeterWriter {
    /// Never blocks: a full ring silently drops the newest frame rather than
    /// stalling the audio thread.
    pub fn push(&self, frame: MeterFrame) {
        match self.tx.try_send(frame) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

pub struct MeterReader {
    rx: Receiver<MeterFrame>,
}

impl MeterReader {
    /// Drains every frame currently queued, keeping only the most recent
    /// reading per channel.
    pub fn drain_latest(&self) -> Vec<MeterFrame> {
        let mut latest: Vec<MeterFrame> = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            if let Some(existing) = latest.iter_mut().find(|f: &&mut MeterFrame| f.channel == frame.channel) {
                *existing = frame;
            } else {
                latest.push(frame);
            }
        }
        latest
    }
}

pub fn metering_channel(capacity: usize) -> (MeterWriter, MeterReader) {
    let (tx, rx) = bounded(capacity);
    (MeterWriter { tx }, MeterReader { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_maps_to_floor_db() {
        assert_eq!(amplitude_to_db(0.0), SILENCE_FLOOR_DB);
    }

    #[test]
    fn full_scale_is_zero_db() {
        assert!((amplitude_to_db(1.0) - 0.0).abs() < 1e-4);
    }

    #[test]
    fn drain_latest_keeps_most_recent_per_channel() {
        let (writer, reader) = metering_channel(16);
        writer.push(MeterFrame { channel: ChannelId::new(1), peak_db: -10.0, rms_db: -20.0 });
        writer.push(MeterFrame { channel: ChannelId::new(1), peak_db: -1.0, rms_db: -5.0 });
        let latest = reader.drain_latest();
        assert_eq!(latest.len(), 1);
        assert!((latest[0].peak_db + 1.0).abs() < 1e-6);
    }

    #[test]
    fn full_ring_drops_silently_without_panicking() {
        let (writer, _reader) = metering_channel(1);
        writer.push(MeterFrame { channel: ChannelId::new(1), peak_db: 0.0, rms_db: 0.0 });
        writer.push(MeterFrame { channel: ChannelId::new(1), peak_db: 0.0, rms_db: 0.0 });
    }
}
