//! Voice input path.
//!
//! Each subscribed remote audio track gets its own reader task. Frames are
//! grouped into utterances by `UtteranceSegmenter` and handed to the session
//! input queue, where they are transcribed in arrival order.

use futures::{Stream, StreamExt};
use livekit::track::RemoteAudioTrack;
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use livepersona_core::transcription::{SegmenterConfig, UtteranceSegmenter};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::session::SessionInput;

/// Reads mono PCM from `track` until it ends or the session queue closes.
pub async fn read_track(
    track: RemoteAudioTrack,
    participant: String,
    tx: mpsc::Sender<SessionInput>,
    config: SegmenterConfig,
) {
    info!(%participant, sample_rate = config.sample_rate, "Listening to audio track");
    let stream = NativeAudioStream::new(track.rtc_track(), config.sample_rate as i32, 1);
    let frames = stream.map(|frame| frame.data.to_vec());

    segment_frames(frames, UtteranceSegmenter::new(config), tx).await;
    info!(%participant, "Audio track ended");
}

/// Feeds frames through the segmenter and forwards each closed utterance.
pub async fn segment_frames<S>(
    mut frames: S,
    mut segmenter: UtteranceSegmenter,
    tx: mpsc::Sender<SessionInput>,
) where
    S: Stream<Item = Vec<i16>> + Unpin,
{
    let sample_rate = segmenter.sample_rate();

    while let Some(frame) = frames.next().await {
        if let Some(pcm) = segmenter.push(&frame) {
            debug!(samples = pcm.len(), "Utterance detected");
            if tx
                .send(SessionInput::Utterance { pcm, sample_rate })
                .await
                .is_err()
            {
                return;
            }
        }
    }

    if let Some(pcm) = segmenter.flush() {
        let _ = tx.send(SessionInput::Utterance { pcm, sample_rate }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const FRAME: usize = 240;

    fn loud() -> Vec<i16> {
        (0..FRAME)
            .map(|i| if i % 2 == 0 { 3000 } else { -3000 })
            .collect()
    }

    fn frames(pattern: &[(bool, usize)]) -> Vec<Vec<i16>> {
        pattern
            .iter()
            .flat_map(|&(is_loud, count)| {
                let frame = if is_loud { loud() } else { vec![0; FRAME] };
                std::iter::repeat_n(frame, count)
            })
            .collect()
    }

    fn drain(rx: &mut mpsc::Receiver<SessionInput>) -> Vec<SessionInput> {
        let mut out = Vec::new();
        while let Ok(input) = rx.try_recv() {
            out.push(input);
        }
        out
    }

    #[tokio::test]
    async fn two_utterances_separated_by_silence() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = frames(&[(true, 40), (false, 90), (true, 50), (false, 90)]);

        segment_frames(
            stream::iter(input),
            UtteranceSegmenter::new(SegmenterConfig::default()),
            tx,
        )
        .await;

        let received = drain(&mut rx);
        assert_eq!(received.len(), 2);
        match &received[0] {
            SessionInput::Utterance { pcm, sample_rate } => {
                assert_eq!(*sample_rate, 24_000);
                assert_eq!(pcm.len(), (40 + 80) * FRAME);
            }
            other => panic!("unexpected input: {:?}", other),
        }
    }

    #[tokio::test]
    async fn trailing_speech_is_flushed_when_track_ends() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = frames(&[(false, 10), (true, 40)]);

        segment_frames(
            stream::iter(input),
            UtteranceSegmenter::new(SegmenterConfig::default()),
            tx,
        )
        .await;

        let received = drain(&mut rx);
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn stops_when_queue_is_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let input = frames(&[(true, 40), (false, 90), (true, 40), (false, 90)]);

        // Returns instead of looping forever on a dead queue.
        segment_frames(
            stream::iter(input),
            UtteranceSegmenter::new(SegmenterConfig::default()),
            tx,
        )
        .await;
    }
}
