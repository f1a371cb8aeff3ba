use std::collections::HashSet;

use glam::Vec2;

use crate::controller::movement::MoveFlags;

/// Input as the frame loop sees it, whatever host produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    // Keyboard events, carrying physical key codes ("KeyW", "ArrowUp", "Escape")
    KeyDown(String),
    KeyUp(String),

    // Mouse events
    /// Relative motion, reported while the pointer is locked or a button is held.
    MouseMove { dx: f32, dy: f32 },
    /// Absolute pointer position in logical pixels.
    PointerMoved { x: f32, y: f32 },
    MouseClick { button: MouseButton, is_down: bool, x: f32, y: f32 },
    MouseWheel { delta_y: f32 },

    // Touch events with the number of active touches
    TouchStart { x: f32, y: f32, touches: u32 },
    TouchMove { x: f32, y: f32, touches: u32 },
    TouchEnd,

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
    PointerLockChanged { locked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_web_button(button: i16) -> Self {
        match button {
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Left,
        }
    }
}

/// Accumulated input between two frames.
#[derive(Debug, Default)]
pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub pointer_locked: bool,
    pub pointer_pos: Vec2,
    /// Left button held without pointer lock (orbit drag).
    pub dragging: bool,
    drag_delta: Vec2,
    wheel_delta: f32,
    last_touch: Option<Vec2>,
    touch_delta: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the accumulated state.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(key.as_str());
            }
            InputEvent::MouseMove { dx, dy } => {
                if self.dragging && !self.pointer_locked {
                    self.drag_delta += Vec2::new(*dx, *dy);
                }
            }
            InputEvent::PointerMoved { x, y } => {
                self.pointer_pos = Vec2::new(*x, *y);
            }
            InputEvent::MouseClick { button: MouseButton::Left, is_down, x, y } => {
                self.dragging = *is_down;
                self.pointer_pos = Vec2::new(*x, *y);
            }
            InputEvent::MouseClick { .. } => {}
            InputEvent::MouseWheel { delta_y } => {
                self.wheel_delta += delta_y;
            }
            InputEvent::TouchStart { x, y, touches } => {
                self.last_touch = (*touches == 1).then_some(Vec2::new(*x, *y));
            }
            InputEvent::TouchMove { x, y, touches } => {
                let p = Vec2::new(*x, *y);
                match self.last_touch {
                    Some(last) if *touches == 1 => {
                        self.touch_delta += p - last;
                        self.last_touch = Some(p);
                    }
                    _ => self.last_touch = None,
                }
            }
            InputEvent::TouchEnd => {
                self.last_touch = None;
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
                self.dragging = false;
            }
            InputEvent::PointerLockChanged { locked } => {
                self.pointer_locked = *locked;
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn consume_drag(&mut self) -> Vec2 {
        std::mem::take(&mut self.drag_delta)
    }

    pub fn consume_wheel(&mut self) -> f32 {
        std::mem::take(&mut self.wheel_delta)
    }

    /// Single-finger drag since the last call.
    pub fn consume_touch(&mut self) -> Vec2 {
        std::mem::take(&mut self.touch_delta)
    }
}

/// Movement keys by DOM `code`.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub forward: [&'static str; 2],
    pub backward: [&'static str; 2],
    pub left: [&'static str; 2],
    pub right: [&'static str; 2],
    pub escape: &'static str,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: ["KeyW", "ArrowUp"],
            backward: ["KeyS", "ArrowDown"],
            left: ["KeyA", "ArrowLeft"],
            right: ["KeyD", "ArrowRight"],
            escape: "Escape",
        }
    }
}

/// Reads movement flags and special keys out of [`InputState`].
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    fn any(&self, input: &InputState, keys: &[&str]) -> bool {
        keys.iter().any(|k| input.is_key_pressed(k))
    }

    pub fn movement_flags(&self, input: &InputState) -> MoveFlags {
        MoveFlags {
            forward: self.any(input, &self.bindings.forward),
            backward: self.any(input, &self.bindings.backward),
            left: self.any(input, &self.bindings.left),
            right: self.any(input, &self.bindings.right),
        }
    }

    pub fn is_escape(&self, key: &str) -> bool {
        key == self.bindings.escape
    }

    /// Keys whose browser default (scrolling) should be suppressed.
    pub fn is_movement_key(&self, key: &str) -> bool {
        [self.bindings.forward, self.bindings.backward, self.bindings.left, self.bindings.right]
            .iter()
            .any(|keys| keys.contains(&key))
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{KeyboardEvent, MouseEvent, TouchEvent, WheelEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let code = e.code();
        if is_down {
            InputEvent::KeyDown(code)
        } else {
            InputEvent::KeyUp(code)
        }
    }

    pub fn mouse_click_to_input(e: &MouseEvent, is_down: bool) -> InputEvent {
        InputEvent::MouseClick {
            button: MouseButton::from_web_button(e.button()),
            is_down,
            x: e.client_x() as f32,
            y: e.client_y() as f32,
        }
    }

    pub fn mouse_wheel_to_input(e: &WheelEvent) -> InputEvent {
        InputEvent::MouseWheel { delta_y: e.delta_y() as f32 }
    }

    /// First touch point and the active count.
    pub fn touch_point(e: &TouchEvent) -> Option<(f32, f32, u32)> {
        let touches = e.touches();
        let first = touches.get(0)?;
        Some((first.client_x() as f32, first.client_y() as f32, touches.length()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrow_and_letter_keys_share_flags() {
        let processor = InputProcessor::default();
        let mut input = InputState::new();
        input.process_event(&InputEvent::KeyDown("ArrowUp".into()));
        input.process_event(&InputEvent::KeyDown("KeyD".into()));
        let flags = processor.movement_flags(&input);
        assert!(flags.forward && flags.right && !flags.backward && !flags.left);
    }

    #[test]
    fn focus_loss_clears_keys() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::KeyDown("KeyW".into()));
        input.process_event(&InputEvent::FocusLost);
        assert!(input.pressed_keys.is_empty());
    }

    #[test]
    fn drag_accumulates_only_while_button_held() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::MouseMove { dx: 5.0, dy: 0.0 });
        input.process_event(&InputEvent::MouseClick { button: MouseButton::Left, is_down: true, x: 0.0, y: 0.0 });
        input.process_event(&InputEvent::MouseMove { dx: 3.0, dy: -2.0 });
        assert_eq!(input.consume_drag(), Vec2::new(3.0, -2.0));
        assert_eq!(input.consume_drag(), Vec2::ZERO);
    }

    #[test]
    fn second_finger_cancels_touch_look() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::TouchStart { x: 10.0, y: 10.0, touches: 1 });
        input.process_event(&InputEvent::TouchMove { x: 15.0, y: 12.0, touches: 1 });
        input.process_event(&InputEvent::TouchMove { x: 30.0, y: 30.0, touches: 2 });
        input.process_event(&InputEvent::TouchMove { x: 40.0, y: 40.0, touches: 1 });
        assert_eq!(input.consume_touch(), Vec2::new(5.0, 2.0));
        assert_eq!(input.last_touch, None);
    }
}
