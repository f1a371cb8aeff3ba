// CONTROLLER: input, interaction, and the per-frame update
pub mod avatar;
pub mod frame_loop;
pub mod input;
pub mod interaction;
pub mod movement;
pub mod orbit;

pub use avatar::Avatar;
pub use frame_loop::{
    BackgroundUniform, CameraUniform, DemoState, FrameClock, FrameLoopContext, FramePlan, LensUniform,
    LightingUniform, RenderPass, UiActions, UiModel,
};
pub use input::{InputEvent, InputProcessor, InputState, MouseButton};
pub use interaction::{ControlMode, DisplacementIntent, InputResponse, InteractionController, LockState};
pub use movement::{MoveFlags, MovementState};
pub use orbit::OrbitController;
