// ADSR Envelope implementation
//
// Linear Attack-Decay-Sustain-Release amplitude envelope

/// ADSR Envelope parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    /// Attack time in seconds (0.001 to 5.0)
    pub attack: f32,
    /// Decay time in seconds (0.001 to 5.0)
    pub decay: f32,
    /// Sustain level (0.0 to 1.0)
    pub sustain: f32,
    /// Release time in seconds (0.001 to 5.0)
    pub release: f32,
}

impl AdsrParams {
    /// Create ADSR parameters with validation
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(0.001, 5.0),
            decay: decay.clamp(0.001, 5.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(0.001, 5.0),
        }
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        // Plucky default: short attack, low sustain, long tail
        Self {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.3,
            release: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR Envelope Generator
///
/// `process()` returns one gain value in [0, 1] per sample.
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    params: AdsrParams,
    stage: Stage,
    level: f32,
    /// Level at the start of the current stage
    stage_start: f32,
    /// Samples elapsed in the current stage
    elapsed: f32,
    sample_rate: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            params,
            stage: Stage::Idle,
            level: 0.0,
            stage_start: 0.0,
            elapsed: 0.0,
            sample_rate,
        }
    }

    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }

    /// Start the attack from the current level (no click on retrigger)
    pub fn note_on(&mut self) {
        self.enter(Stage::Attack);
    }

    /// Start the release from the current level
    pub fn note_off(&mut self) {
        if self.stage != Stage::Idle {
            self.enter(Stage::Release);
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_start = self.level;
        self.elapsed = 0.0;
    }

    fn stage_samples(&self, seconds: f32) -> f32 {
        (seconds * self.sample_rate).max(1.0)
    }

    pub fn process(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                let length = self.stage_samples(self.params.attack);
                self.elapsed += 1.0;
                let progress = (self.elapsed / length).min(1.0);
                self.level = self.stage_start + (1.0 - self.stage_start) * progress;
                if progress >= 1.0 {
                    self.enter(Stage::Decay);
                }
            }
            Stage::Decay => {
                let length = self.stage_samples(self.params.decay);
                self.elapsed += 1.0;
                let progress = (self.elapsed / length).min(1.0);
                self.level = 1.0 - (1.0 - self.params.sustain) * progress;
                if progress >= 1.0 {
                    self.enter(Stage::Sustain);
                }
            }
            Stage::Sustain => self.level = self.params.sustain,
            Stage::Release => {
                let length = self.stage_samples(self.params.release);
                self.elapsed += 1.0;
                let progress = (self.elapsed / length).min(1.0);
                self.level = self.stage_start * (1.0 - progress);
                if progress >= 1.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }

        self.level
    }

    /// True until the release has fully decayed
    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == Stage::Release
    }

    pub fn current_value(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.stage_start = 0.0;
        self.elapsed = 0.0;
    }
}
