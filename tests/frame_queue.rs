//! Frame queue integration tests
//!
//! Exercise the capture → recognition hand-off without audio hardware.

use std::time::{Duration, Instant};

use tokio_test::{assert_err, assert_ok};

use jarvis_voice::voice::{FrameChunker, FrameMessage, PushOutcome, frame_queue};

mod common;
use common::frame;

#[tokio::test]
async fn test_slow_consumer_never_blocks_producer() {
    let (tx, mut rx) = frame_queue(8);

    let producer_tx = tx.clone();
    let producer = std::thread::spawn(move || {
        let started = Instant::now();
        let outcomes: Vec<PushOutcome> = (0..1000).map(|seq| producer_tx.push(frame(seq))).collect();
        (started.elapsed(), outcomes)
    });

    // Consumer is busy while the producer runs
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (elapsed, outcomes) = producer.join().unwrap();
    assert!(elapsed < Duration::from_secs(1), "producer stalled for {elapsed:?}");

    let queued = outcomes.iter().filter(|o| **o == PushOutcome::Queued).count();
    let dropped = outcomes.iter().filter(|o| **o == PushOutcome::Dropped).count();
    assert_eq!(queued, 8);
    assert_eq!(queued + dropped, 1000);
    assert_eq!(tx.dropped(), 992);

    assert_ok!(tx.end_of_stream(Duration::from_secs(1)).await);

    let mut sequences = Vec::new();
    loop {
        match rx.recv().await {
            FrameMessage::Frame(f) => sequences.push(f.sequence),
            FrameMessage::EndOfStream => break,
        }
    }
    // Newest frames are the ones dropped, so the oldest survive in order
    assert_eq!(sequences, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_end_of_stream_follows_every_queued_frame() {
    let (tx, mut rx) = frame_queue(16);
    for seq in 0..5 {
        assert_eq!(tx.push(frame(seq)), PushOutcome::Queued);
    }
    tx.end_of_stream(Duration::from_secs(1)).await.unwrap();

    for expected in 0..5 {
        let FrameMessage::Frame(f) = rx.recv().await else {
            panic!("end of stream arrived before frame {expected}");
        };
        assert_eq!(f.sequence, expected);
    }
    assert!(matches!(rx.recv().await, FrameMessage::EndOfStream));
}

#[tokio::test]
async fn test_dropped_senders_read_as_end_of_stream() {
    let (tx, mut rx) = frame_queue(4);
    tx.push(frame(0));
    drop(tx);

    assert!(matches!(rx.recv().await, FrameMessage::Frame(_)));
    assert!(matches!(rx.recv().await, FrameMessage::EndOfStream));
}

#[tokio::test]
async fn test_end_of_stream_times_out_on_full_queue() {
    let (tx, _rx) = frame_queue(1);
    tx.push(frame(0));

    assert_err!(tx.end_of_stream(Duration::from_millis(20)).await);
}

#[tokio::test]
async fn test_push_after_consumer_gone() {
    let (tx, rx) = frame_queue(4);
    drop(rx);
    assert_eq!(tx.push(frame(0)), PushOutcome::Closed);
}

#[tokio::test]
async fn test_chunker_emits_fixed_frames_in_sequence() {
    let (tx, mut rx) = frame_queue(8);
    let mut chunker = FrameChunker::new(160, tx);

    assert_eq!(chunker.push_samples(&[1; 100]), 0);
    assert_eq!(chunker.next_sequence(), 0);
    assert_eq!(chunker.push_samples(&[2; 300]), 0);
    assert_eq!(chunker.next_sequence(), 2);
    drop(chunker);

    let mut frames = Vec::new();
    while let FrameMessage::Frame(f) = rx.recv().await {
        frames.push(f);
    }
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.samples.len() == 160));
    assert_eq!(frames[0].sequence, 0);
    assert_eq!(frames[1].sequence, 1);
    assert_eq!(&frames[0].samples[..100], &[1; 100][..]);
    assert_eq!(frames[0].samples[100], 2);
}
