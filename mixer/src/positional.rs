use crate::mix::{combine, Contribution};
use crate::oracle::WorldOracle;
use crate::registry::{Session, SessionRegistry};
use log::trace;

/// Produces one listener's mixed frame for one tick.
///
/// The mixer reads speaker buffers without consuming them (eviction is the
/// scheduler's trim step), pairs each speaker's oldest not-yet-mixed frame
/// with the oracle's gain, and appends the combined result to the
/// listener's output buffer.
pub struct PositionalMixer<'a> {
    registry: &'a SessionRegistry,
    oracle: &'a dyn WorldOracle,
}

impl<'a> PositionalMixer<'a> {
    pub fn new(registry: &'a SessionRegistry, oracle: &'a dyn WorldOracle) -> Self {
        Self { registry, oracle }
    }

    /// Mix one tick's audio for the listener. Returns true when a frame
    /// was appended to the listener's output buffer.
    ///
    /// Every missing piece (congested output, no relevant speakers, empty
    /// or already-mixed speaker buffers, speakers without a live session)
    /// contributes nothing rather than failing.
    pub fn mix(&self, listener: &Session) -> bool {
        if !listener.output.has_capacity() {
            trace!(
                "output congested for {}, skipping tick",
                listener.participant()
            );
            return false;
        }

        let speakers = self.oracle.relevant_speakers(listener.participant());

        let mut watermarks = listener.mixed_watermarks.lock().unwrap();
        // Watermarks of speakers that moved out of range are meaningless now
        watermarks.retain(|speaker, _| speakers.contains(speaker));

        let mut parts = Vec::with_capacity(speakers.len());
        for speaker in speakers {
            // A participant never hears their own stream
            if speaker == listener.participant() {
                continue;
            }
            let Some(source) = self.registry.session(speaker) else {
                continue;
            };
            let Some(queued) = source.input.first_after(watermarks.get(&speaker).copied()) else {
                continue;
            };
            let gain = self.oracle.gain(listener.participant(), speaker);
            watermarks.insert(speaker, queued.seq);
            parts.push(Contribution {
                data: queued.frame,
                gain,
            });
        }
        drop(watermarks);

        match combine(parts) {
            Some(frame) => listener.output.push(frame),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockWorldOracle;
    use voice_core::{ChannelId, GainPair, ParticipantId, PcmFrame};

    fn oracle_hearing(
        speakers: Vec<ParticipantId>,
        gain: GainPair,
    ) -> MockWorldOracle {
        let mut oracle = MockWorldOracle::new();
        oracle
            .expect_relevant_speakers()
            .returning(move |_| speakers.clone());
        oracle.expect_gain().returning(move |_, _| gain);
        oracle
    }

    fn frame(value: i16) -> PcmFrame {
        PcmFrame::from_samples(&[value, value])
    }

    #[test]
    fn mixes_oldest_frame_with_gain() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        speaker.input.push(frame(1000));
        speaker.input.push(frame(2000));

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(0.5));
        let mixer = PositionalMixer::new(&registry, &oracle);

        assert!(mixer.mix(&listener));
        let mixed = listener.output.pop().unwrap();
        assert_eq!(mixed.sample(0), Some(500));
        assert_eq!(mixed.sample(1), Some(500));
        // Reading does not consume: eviction belongs to the trim step
        assert_eq!(speaker.input.len(), 2);
    }

    #[test]
    fn unchanged_frame_is_never_mixed_twice() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        speaker.input.push(frame(1000));

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);

        // First tick mixes the frame
        assert!(mixer.mix(&listener));
        assert_eq!(listener.output.len(), 1);

        // Trimming has not removed it yet; the second tick must not mix
        // the same frame again and produces no output at all
        assert!(!mixer.mix(&listener));
        assert_eq!(listener.output.len(), 1);

        // A newly admitted frame is mixed normally
        speaker.input.push(frame(2000));
        assert!(mixer.mix(&listener));
        assert_eq!(listener.output.len(), 2);
        listener.output.pop();
        assert_eq!(listener.output.pop().unwrap().sample(0), Some(2000));
    }

    #[test]
    fn advances_past_unchanged_frame_when_newer_one_is_queued() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        speaker.input.push(frame(1000));
        speaker.input.push(frame(2000));

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);

        assert!(mixer.mix(&listener));
        // No trim in between: the second mix picks the next queued frame
        assert!(mixer.mix(&listener));

        assert_eq!(listener.output.pop().unwrap().sample(0), Some(1000));
        assert_eq!(listener.output.pop().unwrap().sample(0), Some(2000));
    }

    #[test]
    fn empty_speaker_buffer_contributes_silence() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);

        // No frames queued anywhere: no output frame at all
        assert!(!mixer.mix(&listener));
        assert!(listener.output.is_empty());
    }

    #[test]
    fn vanished_speaker_is_skipped() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let listener = registry.open_session(ParticipantId::new(), channel);
        let ghost = ParticipantId::new(); // no session behind this id

        let oracle = oracle_hearing(vec![ghost], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);

        assert!(!mixer.mix(&listener));
        assert!(listener.output.is_empty());
    }

    #[test]
    fn congested_output_skips_the_whole_tick() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        speaker.input.push(frame(1000));
        while listener.output.push(PcmFrame::silence()) {}

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);

        let pending = listener.output.len();
        assert!(!mixer.mix(&listener));
        assert_eq!(listener.output.len(), pending);
        // The speaker's frame was not consumed or watermarked
        assert!(listener.mixed_watermarks.lock().unwrap().is_empty());
    }

    #[test]
    fn watermarks_follow_the_relevant_set() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let speaker = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        speaker.input.push(frame(1000));

        let oracle = oracle_hearing(vec![speaker.participant()], GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &oracle);
        assert!(mixer.mix(&listener));
        assert!(listener
            .mixed_watermarks
            .lock()
            .unwrap()
            .contains_key(&speaker.participant()));

        // Speaker moves out of range: its watermark is discarded
        let silent_oracle = oracle_hearing(Vec::new(), GainPair::splat(1.0));
        let mixer = PositionalMixer::new(&registry, &silent_oracle);
        assert!(!mixer.mix(&listener));
        assert!(listener.mixed_watermarks.lock().unwrap().is_empty());
    }

    #[test]
    fn multiple_speakers_sum_with_their_own_gains() {
        let registry = SessionRegistry::new();
        let channel = ChannelId::new();
        let quiet = registry.open_session(ParticipantId::new(), channel);
        let loud = registry.open_session(ParticipantId::new(), channel);
        let listener = registry.open_session(ParticipantId::new(), channel);

        quiet.input.push(frame(1000));
        loud.input.push(frame(1000));

        let quiet_id = quiet.participant();
        let mut oracle = MockWorldOracle::new();
        let speakers = vec![quiet_id, loud.participant()];
        oracle
            .expect_relevant_speakers()
            .returning(move |_| speakers.clone());
        oracle.expect_gain().returning(move |_, speaker| {
            if speaker == quiet_id {
                GainPair::splat(0.25)
            } else {
                GainPair::splat(1.0)
            }
        });

        let mixer = PositionalMixer::new(&registry, &oracle);
        assert!(mixer.mix(&listener));
        let mixed = listener.output.pop().unwrap();
        assert_eq!(mixed.sample(0), Some(1250));
        assert_eq!(mixed.sample(1), Some(1250));
    }
}
