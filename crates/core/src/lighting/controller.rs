//! Grid lighting controller.
//!
//! Ties the note-age tracker, the static color policy and the NRPN codec to
//! a [`DeviceSession`]. All methods are non-blocking and expect to be called
//! from one logical thread: the host's polling cycle calls [`GridLighting::tick`],
//! note events go through [`GridLighting::trigger`], and control changes from
//! the device go through [`GridLighting::on_device_control_change`].

use std::collections::VecDeque;

use super::color::{resolve_static_color, ColorClass};
use super::geometry::{
    cells_for_pitch, grid_to_pitch, DEFAULT_OCTAVE, GRID_COLUMNS, GRID_ROWS, MAX_OCTAVE, MIN_OCTAVE,
};
use super::modulation::ModulationSnapshot;
use super::note_age::{Millis, NoteAgeTracker, Repaint, NUM_PITCHES};
use super::nrpn::{NrpnDecoder, NrpnMessage};
use super::scale::ScaleOracle;
use super::session::{DeviceError, DeviceSession};

/// Channel used for per-cell color messages.
pub const CELL_CHANNEL: u8 = 0;

/// Controllers addressing a single cell.
pub mod cell_cc {
    /// Column, offset by one for the device's control column.
    pub const COLUMN: u8 = 20;
    pub const ROW: u8 = 21;
    pub const COLOR: u8 = 22;
}

/// NRPN asking the device to report a setting.
pub const OCTAVE_QUERY_PARAM: u16 = 299;

/// NRPN parameter of the left split octave.
pub const OCTAVE_PARAM: u16 = 36;

pub const DEFAULT_OCTAVE_QUERY_INTERVAL_MS: Millis = 2000.0;

/// First "main note light" NRPN (C); one per pitch class.
pub const SCALE_MAIN_LIGHT_BASE: u16 = 203;

/// First "accent note light" NRPN (C); one per pitch class.
pub const SCALE_ACCENT_LIGHT_BASE: u16 = 215;

/// Spacing between scale light NRPNs.
pub const SCALE_LIGHT_SPACING_MS: Millis = 10.0;

pub const DEFAULT_DECAY_MS: f32 = 500.0;
pub const MAX_DECAY_MS: f32 = 2000.0;

/// Device name fragment used to pick a port automatically.
pub const DEVICE_NAME: &str = "LinnStrument";

/// Lighting configuration that survives restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub device_index: Option<usize>,
    pub decay_ms: f32,
    /// Render every cell black regardless of scale.
    pub blackout: bool,
    /// Octave last reported by the device.
    pub octave: i32,
    /// Also push scale membership to the device's own note lights.
    pub send_scale_lights: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            decay_ms: DEFAULT_DECAY_MS,
            blackout: false,
            octave: DEFAULT_OCTAVE,
            send_scale_lights: false,
        }
    }
}

/// Drives the lights of a LinnStrument-style grid from note activity.
pub struct GridLighting<S, D> {
    scale: S,
    session: D,
    config: DeviceConfig,
    tracker: NoteAgeTracker,
    decoder: NrpnDecoder,
    now: Millis,
    octave_query_interval: Millis,
    last_octave_request: Option<Millis>,
    last_octave_response: Option<Millis>,
    scale_lights: VecDeque<NrpnMessage>,
    last_scale_light: Option<Millis>,
}

impl<S: ScaleOracle, D: DeviceSession> GridLighting<S, D> {
    pub fn new(scale: S, session: D, config: DeviceConfig) -> Self {
        let mut config = config;
        config.decay_ms = config.decay_ms.clamp(0.0, MAX_DECAY_MS);

        Self {
            scale,
            session,
            config,
            tracker: NoteAgeTracker::new(),
            decoder: NrpnDecoder::new(),
            now: 0.0,
            octave_query_interval: DEFAULT_OCTAVE_QUERY_INTERVAL_MS,
            last_octave_request: None,
            last_octave_response: None,
            scale_lights: VecDeque::new(),
            last_scale_light: None,
        }
    }

    pub fn with_octave_query_interval(mut self, interval_ms: Millis) -> Self {
        self.octave_query_interval = interval_ms;
        self
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn octave(&self) -> i32 {
        self.config.octave
    }

    pub fn scale(&self) -> &S {
        &self.scale
    }

    pub fn session(&self) -> &D {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut D {
        &mut self.session
    }

    pub fn tracker(&self) -> &NoteAgeTracker {
        &self.tracker
    }

    /// Connect to the first port whose name contains `name` (normally
    /// [`DEVICE_NAME`]).
    pub fn init(&mut self, name: &str) -> Option<usize> {
        let index = self
            .session
            .port_names()
            .iter()
            .position(|port| port.contains(name));

        match index {
            Some(index) => {
                self.select_device(index);
                Some(index)
            }
            None => {
                log::info!("No {} found among MIDI outputs", name);
                None
            }
        }
    }

    /// Switch to the output port at `index` and repaint.
    pub fn select_device(&mut self, index: usize) {
        self.config.device_index = Some(index);
        self.connect_selected();
        self.repaint_all();
    }

    pub fn set_blackout(&mut self, blackout: bool) {
        self.config.blackout = blackout;
        self.repaint_all();
    }

    /// Set the decay time, clamped to `0..=2000` ms.
    pub fn set_decay_ms(&mut self, decay_ms: f32) {
        self.config.decay_ms = decay_ms.clamp(0.0, MAX_DECAY_MS);
        self.repaint_all();
    }

    pub fn set_send_scale_lights(&mut self, enabled: bool) {
        self.config.send_scale_lights = enabled;
    }

    /// Rebuild the configuration from saved state and reconnect.
    pub fn restore_state(&mut self, device_index: Option<usize>, decay_ms: f32, blackout: bool) {
        self.config.device_index = device_index;
        self.config.decay_ms = decay_ms.clamp(0.0, MAX_DECAY_MS);
        self.config.blackout = blackout;
        self.connect_selected();
        self.repaint_all();
    }

    /// Called by whoever owns the scale after mutating it.
    pub fn on_scale_changed(&mut self) {
        if self.config.send_scale_lights {
            self.send_scale_info();
        }
        self.repaint_all();
    }

    /// Record a note event and immediately refresh that pitch at `time`.
    ///
    /// Pitches outside `0..=127` are ignored.
    pub fn trigger(
        &mut self,
        pitch: i32,
        velocity: u8,
        voice: Option<usize>,
        modulation: ModulationSnapshot,
        time: Millis,
    ) {
        match self.tracker.trigger(pitch, velocity, voice, modulation, time) {
            Some(index) => self.step_pitch(index, time.max(self.now)),
            None => log::debug!("Ignoring trigger for out-of-range pitch {}", pitch),
        }
    }

    /// One polling cycle: refresh all 128 timers, then run the periodic
    /// device handshakes.
    pub fn tick(&mut self, now: Millis) {
        self.now = now;
        for pitch in 0..NUM_PITCHES as u8 {
            self.step_pitch(pitch, now);
        }
        self.poll_octave();
        self.drain_scale_lights();
    }

    /// Feed one control change received from the device.
    pub fn on_device_control_change(&mut self, controller: u8, value: u8) {
        let Some(message) = self.decoder.feed(controller, value) else {
            return;
        };

        if message.param == OCTAVE_PARAM {
            self.last_octave_response = Some(self.now);
            let octave = message.value as i32;
            if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
                log::debug!("Ignoring out-of-range octave report {}", octave);
                return;
            }
            if octave != self.config.octave {
                log::info!("Device octave changed {} -> {}", self.config.octave, octave);
                self.config.octave = octave;
                self.repaint_all();
            }
        }
    }

    /// Answer a note played on the device so it does not light it itself.
    pub fn on_device_note(&mut self, pitch: u8, channel: u8) {
        let result = self.session.send_note_off(pitch, channel);
        self.report(result);
    }

    /// Static color of cell `(x, y)`.
    pub fn grid_color(&self, x: u8, y: u8) -> ColorClass {
        resolve_static_color(
            &self.scale,
            grid_to_pitch(x, y, self.config.octave),
            self.config.blackout,
        )
    }

    /// Paint all 200 cells with their static color.
    pub fn repaint_all(&mut self) {
        for y in 0..GRID_ROWS {
            self.send_cell_cc(cell_cc::ROW, y);
            for x in 0..GRID_COLUMNS {
                let color = self.grid_color(x, y);
                self.send_cell_cc(cell_cc::COLUMN, x + 1);
                self.send_cell_cc(cell_cc::COLOR, color.palette_index());
            }
        }
        self.tracker.invalidate_lit();
    }

    /// Queue the scale's note lights for the device. Only 12-tet scales map
    /// onto the device's note light settings.
    pub fn send_scale_info(&mut self) {
        if self.scale.tet() != 12 {
            log::debug!("Skipping scale lights for {}-tet scale", self.scale.tet());
            return;
        }

        self.scale_lights.clear();
        for pitch_class in 0..12u16 {
            let main = self.scale.is_in_scale(pitch_class as i32);
            let accent = self.scale.is_root(pitch_class as i32);
            self.scale_lights.push_back(NrpnMessage::new(
                SCALE_MAIN_LIGHT_BASE + pitch_class,
                main as u16,
            ));
            self.scale_lights.push_back(NrpnMessage::new(
                SCALE_ACCENT_LIGHT_BASE + pitch_class,
                accent as u16,
            ));
        }
    }

    /// Send `param`/`value` as an NRPN sequence.
    pub fn send_nrpn(&mut self, param: u16, value: u16) {
        let result = self.session.send_nrpn(param, value);
        self.report(result);
    }

    fn step_pitch(&mut self, pitch: u8, now: Millis) {
        if let Some(repaint) = self.tracker.step(pitch, now, self.config.decay_ms) {
            self.apply(repaint);
        }
    }

    fn apply(&mut self, repaint: Repaint) {
        if let Some(previous) = repaint.erase {
            self.paint_pitch(previous, None);
        }
        self.paint_pitch(repaint.pitch, repaint.stage.color());
    }

    /// Paint every cell playing `pitch`; `None` restores each cell's static
    /// color.
    fn paint_pitch(&mut self, pitch: i32, color: Option<ColorClass>) {
        for (x, y) in cells_for_pitch(pitch, self.config.octave) {
            let color = color.unwrap_or_else(|| self.grid_color(x, y));
            self.set_grid_color(x, y, color);
        }
    }

    fn set_grid_color(&mut self, x: u8, y: u8, color: ColorClass) {
        self.send_cell_cc(cell_cc::ROW, y);
        self.send_cell_cc(cell_cc::COLUMN, x + 1);
        self.send_cell_cc(cell_cc::COLOR, color.palette_index());
    }

    fn poll_octave(&mut self) {
        let latest = match (self.last_octave_request, self.last_octave_response) {
            (Some(request), Some(response)) => Some(request.max(response)),
            (request, response) => request.or(response),
        };

        let due = latest.map_or(true, |at| self.now - at > self.octave_query_interval);
        if due {
            log::debug!("Requesting device octave");
            self.send_nrpn(OCTAVE_QUERY_PARAM, OCTAVE_PARAM);
            self.last_octave_request = Some(self.now);
        }
    }

    fn drain_scale_lights(&mut self) {
        if self.scale_lights.is_empty() {
            return;
        }

        let due = self
            .last_scale_light
            .map_or(true, |at| self.now - at >= SCALE_LIGHT_SPACING_MS);
        if !due {
            return;
        }

        if let Some(message) = self.scale_lights.pop_front() {
            self.send_nrpn(message.param, message.value);
            self.last_scale_light = Some(self.now);
        }
    }

    fn connect_selected(&mut self) {
        let Some(index) = self.config.device_index else {
            return;
        };

        match self.session.connect(index) {
            Ok(()) => log::info!("Connected to device output {}", index),
            Err(e) => log::warn!("Could not connect to device output {}: {}", index, e),
        }
    }

    fn send_cell_cc(&mut self, controller: u8, value: u8) {
        let result = self
            .session
            .send_control_change(CELL_CHANNEL, controller, value);
        self.report(result);
    }

    fn report(&self, result: Result<(), DeviceError>) {
        match result {
            Ok(()) | Err(DeviceError::NotConnected) => {}
            Err(e) => log::warn!("Device send failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::lighting::color::palette;
    use crate::lighting::nrpn;
    use crate::lighting::scale::{Scale, ScaleKind};
    use crate::lighting::session::RecordingSession;
    use crate::messages::Settings;

    fn lighting() -> GridLighting<Scale, RecordingSession> {
        GridLighting::new(
            Scale::new(0, ScaleKind::Major),
            RecordingSession::with_ports(&["IAC Bus", "LinnStrument MIDI"]),
            DeviceConfig::default(),
        )
    }

    #[test]
    fn test_init_picks_linnstrument_port() {
        let mut lighting = lighting();
        assert_eq!(lighting.init(DEVICE_NAME), Some(1));
        assert_eq!(lighting.session().connected, Some(1));
        assert_eq!(lighting.session().painted_cells().len(), 200);
    }

    #[test]
    fn test_repaint_all_cell_order() {
        let mut lighting = lighting();
        lighting.repaint_all();
        let sent = &lighting.session().sent;

        // one row select per row plus two messages per cell
        assert_eq!(sent.len(), 8 + 200 * 2);
        assert_eq!(sent[0], vec![0xB0, 21, 0]);
        assert_eq!(sent[1], vec![0xB0, 20, 1]);
        assert_eq!(sent[2][1], 22);
    }

    #[test]
    fn test_blackout_paints_everything_black() {
        let mut lighting = lighting();
        lighting.set_blackout(true);
        let cells = lighting.session().painted_cells();
        assert_eq!(cells.len(), 200);
        assert!(cells.iter().all(|&(_, _, color)| color == palette::BLACK));
    }

    #[test]
    fn test_trigger_paints_every_matching_cell() {
        let mut lighting = lighting();
        lighting.tick(0.0);
        lighting.session_mut().take();

        // pitch 35 is at (5, 0) and (0, 1)
        lighting.trigger(35, 100, Some(0), ModulationSnapshot::default(), 0.0);
        let cells = lighting.session().painted_cells();
        assert_eq!(cells, vec![(5, 0, palette::RED), (0, 1, palette::RED)]);
    }

    #[test]
    fn test_trigger_out_of_range_sends_nothing() {
        let mut lighting = lighting();
        lighting.tick(0.0);
        lighting.session_mut().take();

        lighting.trigger(300, 100, Some(0), ModulationSnapshot::default(), 0.0);
        assert!(lighting.session().sent.is_empty());
    }

    #[test]
    fn test_idle_ticks_are_quiet_after_baseline() {
        let mut lighting = lighting();
        lighting.tick(0.0);
        lighting.session_mut().take();

        lighting.tick(20.0);
        lighting.tick(40.0);
        assert!(lighting.session().sent.is_empty());
    }

    #[test]
    fn test_octave_query_is_resent_every_interval() {
        let mut lighting = lighting();
        let queries = |session: &mut RecordingSession| {
            session
                .take()
                .iter()
                .filter(|m| m[0] == 177 && m[1] == 99)
                .count()
        };

        lighting.tick(0.0);
        assert_eq!(queries(lighting.session_mut()), 1);
        lighting.tick(1500.0);
        assert_eq!(queries(lighting.session_mut()), 0);
        lighting.tick(2001.0);
        assert_eq!(queries(lighting.session_mut()), 1);
    }

    #[test]
    fn test_octave_response_delays_next_query() {
        let mut lighting = lighting();
        lighting.tick(0.0);
        lighting.tick(1900.0);
        for (controller, value) in [(99, 0), (98, 36), (6, 0), (38, 5)] {
            lighting.on_device_control_change(controller, value);
        }
        lighting.session_mut().take();

        lighting.tick(2100.0);
        assert!(lighting.session().sent.iter().all(|m| m[0] != 177));
    }

    #[test]
    fn test_octave_report_shifts_grid() {
        let mut lighting = lighting();
        for (controller, value) in [(99, 0), (98, 36), (6, 0), (38, 6)] {
            lighting.on_device_control_change(controller, value);
        }
        assert_eq!(lighting.octave(), 6);
        // repainted with the new mapping
        assert_eq!(lighting.session().painted_cells().len(), 200);

        // C at cell (6, 0) at octave 6: 30 + 6 + 12 = 48
        assert_eq!(lighting.grid_color(6, 0), ColorClass::Green);
    }

    #[test]
    fn test_out_of_range_octave_report_is_ignored() {
        let mut lighting = lighting();
        for message in nrpn::encode(OCTAVE_PARAM, 20) {
            lighting.on_device_control_change(message[1], message[2]);
        }
        assert_eq!(lighting.octave(), DEFAULT_OCTAVE);
        assert!(lighting.session().sent.is_empty());

        let mut settings = Settings::default();
        settings.update_from(lighting.config());
        assert!(ConfigManager::validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_release_is_shown_at_release_time() {
        let mut lighting = lighting();
        lighting.tick(0.0);
        lighting.trigger(61, 100, Some(0), ModulationSnapshot::default(), 0.0);
        lighting.session_mut().take();

        // released between polls: pink right away, not red until the next tick
        lighting.trigger(61, 0, Some(0), ModulationSnapshot::default(), 40.0);
        let cells = lighting.session().painted_cells();
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|&(_, _, color)| color == palette::PINK));
    }

    #[test]
    fn test_other_nrpn_params_leave_octave_alone() {
        let mut lighting = lighting();
        for (controller, value) in [(99, 0), (98, 37), (6, 0), (38, 3)] {
            lighting.on_device_control_change(controller, value);
        }
        assert_eq!(lighting.octave(), DEFAULT_OCTAVE);
        assert!(lighting.session().sent.is_empty());
    }

    #[test]
    fn test_device_notes_are_silenced() {
        let mut lighting = lighting();
        lighting.on_device_note(64, 2);
        assert_eq!(lighting.session().sent, vec![vec![0x92, 64, 0]]);
    }

    #[test]
    fn test_decay_is_clamped() {
        let mut lighting = lighting();
        lighting.set_decay_ms(5000.0);
        assert_eq!(lighting.config().decay_ms, MAX_DECAY_MS);
        lighting.set_decay_ms(-3.0);
        assert_eq!(lighting.config().decay_ms, 0.0);
    }

    #[test]
    fn test_restore_state_reconnects() {
        let mut lighting = lighting();
        lighting.restore_state(Some(0), 800.0, true);
        assert_eq!(lighting.session().connected, Some(0));
        assert_eq!(lighting.config().decay_ms, 800.0);
        assert!(lighting.config().blackout);
    }

    #[test]
    fn test_scale_lights_are_paced() {
        let mut lighting = lighting().with_octave_query_interval(f64::MAX);
        lighting.set_send_scale_lights(true);
        lighting.tick(0.0);
        lighting.on_scale_changed();
        lighting.session_mut().take();

        let mut sent_params = Vec::new();
        let mut now = 0.0;
        for _ in 0..40 {
            now += 5.0;
            lighting.tick(now);
            let sent = lighting.session_mut().take();
            let nrpns: Vec<_> = sent.iter().filter(|m| m[0] == 177 && m[1] == 99).collect();
            assert!(nrpns.len() <= 1);
            if !nrpns.is_empty() {
                let param_lsb = sent.iter().find(|m| m[0] == 177 && m[1] == 98).unwrap()[2];
                let value = sent.iter().find(|m| m[0] == 177 && m[1] == 38).unwrap()[2];
                sent_params.push((nrpns[0][2] as u16) << 7 | param_lsb as u16);
                sent_params.push(value as u16);
            }
        }

        // one NRPN per 10 ms: 20 of the 24 fit in 200 ms
        assert_eq!(sent_params.len(), 2 * 20);
        // C main light on, C accent light on
        assert_eq!(&sent_params[0..4], &[203, 1, 215, 1]);
        // C# main light off
        assert_eq!(&sent_params[4..6], &[204, 0]);
    }
}
