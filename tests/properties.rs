use glam::{Vec2, Vec3};

use opticlab::config::{DemoConfig, DemoKind, WalkSettings};
use opticlab::controller::{
    Avatar, DisplacementIntent, FrameLoopContext, InputEvent, MouseButton, MoveFlags, MovementState, RenderPass,
    UiActions,
};
use opticlab::model::lens::{remap, LensMode, OpacityFade};
use opticlab::model::{Aabb, CollisionVolumeSet, LoadedAssets, ReflectionSchedule, SceneMesh, ViewPresets};
use opticlab::utils::{Mesh, Vertex};
use opticlab::DemoError;

/// Two-vertex mesh spanning `min..max`; enough for bounds and tags.
fn box_mesh(min: Vec3, max: Vec3) -> Mesh {
    let vertex = |p: Vec3| Vertex { pos: p.to_array(), normal: [0.0, 1.0, 0.0], color: [1.0; 4] };
    Mesh { vertices: vec![vertex(min), vertex(max)], indices: Vec::new() }
}

fn loaded_mirror_demo() -> FrameLoopContext {
    let mut ctx = FrameLoopContext::new(DemoConfig::builtin(DemoKind::Mirror), 800, 600, false).unwrap();
    let assets = LoadedAssets {
        meshes: vec![
            SceneMesh::new("Wall_East", box_mesh(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(-9.0, 20.0, 10.0))),
            SceneMesh::new("Mirror_North", box_mesh(Vec3::new(0.0, 0.0, 9.0), Vec3::new(4.0, 8.0, 9.2))),
        ],
        environment: None,
    };
    ctx.install_assets(Ok(assets));
    ctx
}

#[test]
fn velocity_decays_without_flipping_sign() {
    let steps = [0.016, 0.1, 0.0, 0.033, 0.25, 1.0, 0.001, 5.0];
    for damping in [0.5, 6.0, 40.0] {
        let mut movement = MovementState::new(9.0, damping);
        movement.velocity = Vec2::new(-3.0, 4.0);
        let mut last = movement.velocity;
        for dt in steps {
            movement.integrate(MoveFlags::NONE, dt);
            let v = movement.velocity;
            assert!(v.length() <= last.length(), "damping {damping} dt {dt}");
            assert!(v.x <= 0.0 && v.y >= 0.0, "sign flipped: {v:?}");
            last = v;
        }
    }
}

#[test]
fn overlapping_move_leaves_position_alone() {
    let walk = WalkSettings::default();
    let mut avatar = Avatar::new(&walk);
    avatar.position.y = 2.0;
    let start = avatar.position;
    let wall = CollisionVolumeSet::new(vec![Aabb::new(start + Vec3::new(0.3, -5.0, -5.0), start + Vec3::new(2.0, 5.0, 5.0))]);

    let committed = avatar.step(&DisplacementIntent { world: Vec3::new(0.5, 0.0, 0.0), active: true }, &wall);
    assert!(!committed);
    assert_eq!(avatar.position.x, start.x);
    assert_eq!(avatar.position.z, start.z);
    assert_eq!(avatar.position.y, walk.eye_height);
}

#[test]
fn declared_presets_resolve_and_others_fail() {
    let config = DemoConfig::builtin(DemoKind::AmesRoom);
    let presets = ViewPresets::from_entries(&config.presets);
    for name in ["front", "side", "top", "diagonal"] {
        let preset = presets.get(name).unwrap();
        assert_eq!(preset.target, Vec3::ZERO, "{name}");
    }
    assert_eq!(presets.get("side").unwrap().position, Vec3::new(8.0, 0.0, 0.0));
    assert!(matches!(presets.get("back"), Err(DemoError::UnknownPreset(n)) if n == "back"));
}

#[test]
fn set_view_rejects_unknown_names_on_ames_room() {
    let mut ctx = FrameLoopContext::new(DemoConfig::builtin(DemoKind::AmesRoom), 800, 600, false).unwrap();
    assert!(ctx.set_view("top", false).is_ok());
    assert_eq!(ctx.camera.eye, Vec3::new(0.0, 8.0, 0.0));
    assert!(ctx.set_view("ceiling", true).is_err());
    assert_eq!(ctx.camera.eye, Vec3::new(0.0, 8.0, 0.0));
}

#[test]
fn identity_lens_is_a_pass_through() {
    for &(x, y) in &[(0.0, 0.0), (0.5, 0.5), (0.13, 0.92), (1.0, 0.0), (0.999, 0.001)] {
        let uv = Vec2::new(x, y);
        for power in [0.0, 1.0, 3.5] {
            assert_eq!(remap(LensMode::Identity, power, uv), uv);
        }
    }
}

#[test]
fn opacity_fade_rises_strictly_and_stays_below_one() {
    for rate in [0.02, 0.08, 0.5] {
        let mut fade = OpacityFade::new(rate);
        let mut last = fade.value;
        for _ in 0..150 {
            let v = fade.step(1.0);
            if last < 1.0 {
                assert!(v > last || v == 1.0, "rate {rate}: {v} after {last}");
            }
            assert!(v <= 1.0);
            last = v;
        }
    }
}

#[test]
fn captures_only_on_interval_frames() {
    let schedule = ReflectionSchedule::new(7);
    for frame in 0..100u64 {
        assert_eq!(schedule.should_capture(frame), frame % 7 == 0, "frame {frame}");
    }
}

#[test]
fn mirror_demo_plans_captures_on_schedule() {
    let mut ctx = loaded_mirror_demo();
    assert_eq!(ctx.scene.probes.len(), 1);

    let actions = UiActions::default();
    let mut capture_frames = Vec::new();
    for _ in 0..30 {
        let plan = ctx.update(1.0 / 60.0, &actions);
        assert_eq!(plan.passes.last(), Some(&RenderPass::Screen));
        if plan.passes.contains(&RenderPass::ReflectionCapture { probe: 0 }) {
            capture_frames.push(ctx.frame);
        }
    }
    assert_eq!(capture_frames, [10, 20, 30]);
}

#[test]
fn walking_into_a_wall_stops_short_of_it() {
    let mut ctx = loaded_mirror_demo();
    let actions = UiActions::default();

    let response = ctx.handle_input(&InputEvent::MouseClick { button: MouseButton::Left, is_down: true, x: 0.0, y: 0.0 });
    assert!(response.request_pointer_lock);
    ctx.handle_input(&InputEvent::PointerLockChanged { locked: true });
    ctx.handle_input(&InputEvent::KeyDown("KeyW".to_string()));

    let start_x = ctx.camera.eye.x;
    for _ in 0..600 {
        ctx.update(1.0 / 60.0, &actions);
        let collider = Aabb::from_center_size(ctx.camera.eye, Vec3::new(1.0, 4.5, 1.0));
        assert!(!ctx.scene.collision.overlaps(&collider), "walked into the wall at {}", ctx.camera.eye);
    }
    assert!(ctx.camera.eye.x > start_x, "never moved");
    assert!(ctx.camera.eye.x < -10.0);
}

#[test]
fn lens_demo_renders_offscreen_before_screen() {
    let mut ctx = FrameLoopContext::new(DemoConfig::builtin(DemoKind::Lens), 640, 480, false).unwrap();
    let plan = ctx.update(0.016, &UiActions { lens_mode: Some(LensMode::Convergent), ..UiActions::default() });
    assert_eq!(plan.passes, [RenderPass::LensOffscreen, RenderPass::Screen]);
    let lens = plan.lens.unwrap();
    assert_eq!(lens.mode[0], LensMode::Convergent.index());
}
