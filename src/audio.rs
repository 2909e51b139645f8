use crate::config::{AudioConfig, DonationCue};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};

const CUE_QUEUE_SIZE: usize = 32;

#[async_trait]
pub trait CuePlayer: Send + Sync {
    async fn play(&self, sound: &Path) -> std::io::Result<()>;
}

/// Plays a sound by running an external program with the file path as its only argument.
pub struct CommandPlayer {
    program: String,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CuePlayer for CommandPlayer {
    async fn play(&self, sound: &Path) -> std::io::Result<()> {
        let status = Command::new(&self.program)
            .arg(sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        if !status.success() {
            tracing::warn!(audio.player = %self.program, status = %status, "Audio player exited with failure");
        }
        Ok(())
    }
}

/// The highest cue whose threshold the amount reaches.
pub fn select_cue(cues: &[DonationCue], amount: u64) -> Option<&DonationCue> {
    cues.iter()
        .filter(|cue| cue.min_amount <= amount)
        .max_by_key(|cue| cue.min_amount)
}

/// Enqueue side of the donation audio queue. Cues play one at a time.
#[derive(Clone, Default)]
pub struct AudioCues {
    cues: Arc<Vec<DonationCue>>,
    tx: Option<mpsc::Sender<PathBuf>>,
}

impl AudioCues {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Starts the player task, or returns a disabled queue when no player or no
    /// cues are configured.
    pub fn spawn(config: &AudioConfig, shutdown_rx: watch::Receiver<bool>) -> Self {
        match config.player_command.as_deref().map(str::trim) {
            Some(program) if !program.is_empty() && !config.donation_cues.is_empty() => {
                Self::with_player(
                    Arc::new(CommandPlayer::new(program)),
                    config.donation_cues.clone(),
                    shutdown_rx,
                )
            }
            _ => {
                tracing::info!("Donation audio cues disabled");
                Self::disabled()
            }
        }
    }

    pub fn with_player(
        player: Arc<dyn CuePlayer>,
        cues: Vec<DonationCue>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CUE_QUEUE_SIZE);
        tokio::spawn(run_player(player, rx, shutdown_rx));
        Self {
            cues: Arc::new(cues),
            tx: Some(tx),
        }
    }

    pub fn donation(&self, amount: u64) {
        let Some(tx) = &self.tx else {
            return;
        };
        let Some(cue) = select_cue(&self.cues, amount) else {
            return;
        };
        if let Err(e) = tx.try_send(cue.sound_path.clone()) {
            tracing::warn!(amount, error = %e, "Dropping donation audio cue");
        }
    }
}

async fn run_player(
    player: Arc<dyn CuePlayer>,
    mut rx: mpsc::Receiver<PathBuf>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let sound = tokio::select! {
            biased;
            _ = crate::shutdown::requested(&mut shutdown_rx) => break,
            sound = rx.recv() => match sound {
                Some(sound) => sound,
                None => break,
            },
        };
        tracing::debug!(audio.sound = %sound.display(), "Playing donation cue");
        if let Err(e) = player.play(&sound).await {
            tracing::error!(audio.sound = %sound.display(), error = %e, "Failed to play donation cue");
        }
    }
    tracing::debug!("Audio player stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn cue(min_amount: u64, path: &str) -> DonationCue {
        DonationCue {
            min_amount,
            sound_path: PathBuf::from(path),
        }
    }

    #[derive(Default)]
    struct RecordingPlayer {
        played: Mutex<Vec<PathBuf>>,
        done_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
    }

    #[async_trait]
    impl CuePlayer for RecordingPlayer {
        async fn play(&self, sound: &Path) -> std::io::Result<()> {
            self.played.lock().unwrap().push(sound.to_path_buf());
            if let Some(tx) = self.done_tx.lock().unwrap().as_ref() {
                let _ = tx.send(());
            }
            Ok(())
        }
    }

    #[test]
    fn test_select_highest_reached_cue() {
        let cues = vec![cue(100, "small.wav"), cue(1000, "big.wav"), cue(10, "tiny.wav")];
        assert_eq!(select_cue(&cues, 5).map(|c| c.min_amount), None);
        assert_eq!(select_cue(&cues, 10).map(|c| c.min_amount), Some(10));
        assert_eq!(select_cue(&cues, 999).map(|c| c.min_amount), Some(100));
        assert_eq!(select_cue(&cues, 5000).map(|c| c.min_amount), Some(1000));
    }

    #[tokio::test]
    async fn test_cues_play_in_order() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let player = Arc::new(RecordingPlayer {
            played: Mutex::new(Vec::new()),
            done_tx: Mutex::new(Some(done_tx)),
        });
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let audio = AudioCues::with_player(
            player.clone(),
            vec![cue(1, "one.wav"), cue(250, "big.wav")],
            shutdown_rx,
        );

        audio.donation(250);
        audio.donation(0);
        audio.donation(3);
        done_rx.recv().await.unwrap();
        done_rx.recv().await.unwrap();

        assert_eq!(
            *player.played.lock().unwrap(),
            vec![PathBuf::from("big.wav"), PathBuf::from("one.wav")]
        );
    }

    #[test]
    fn test_disabled_without_player() {
        let (_tx, rx) = watch::channel(false);
        let config = AudioConfig {
            player_command: None,
            donation_cues: vec![cue(1, "one.wav")],
        };
        let audio = AudioCues::spawn(&config, rx);
        assert!(audio.tx.is_none());
        audio.donation(5);
    }
}
