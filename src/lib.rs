pub mod config;
pub mod error;
pub mod logging;
pub mod ui;
pub mod utils;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod view;

pub use error::{DemoError, Result};

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::prelude::wasm_bindgen;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{
        AddEventListenerOptions, Document, Event, EventTarget, HtmlCanvasElement, HtmlElement, KeyboardEvent,
        MouseEvent, TouchEvent, WheelEvent, Window,
    };

    use crate::config::{DemoConfig, DemoKind};
    use crate::controller::input::wasm::{keyboard_event_to_input, mouse_click_to_input, mouse_wheel_to_input, touch_point};
    use crate::controller::{FrameLoopContext, InputEvent, InputProcessor, MouseButton};
    use crate::view::{EguiFrame, GpuContext, RenderState};
    use crate::{logging, ui};

    /// Element the canvas is mounted in; falls back to `<body>`.
    const CONTAINER_ID: &str = "viewer";

    fn js_error(msg: impl std::fmt::Display) -> JsValue {
        JsValue::from_str(&msg.to_string())
    }

    /// `ontouchstart` in window, or any touch points reported by the navigator.
    fn is_touch_device(window: &Window) -> bool {
        js_sys::Reflect::has(window, &JsValue::from_str("ontouchstart")).unwrap_or(false)
            || window.navigator().max_touch_points() > 0
    }

    /// DOM listener removed again when dropped.
    struct Listener {
        target: EventTarget,
        kind: &'static str,
        closure: Closure<dyn FnMut(Event)>,
    }

    impl Listener {
        fn add(target: &EventTarget, kind: &'static str, f: impl FnMut(Event) + 'static) -> Result<Self, JsValue> {
            let closure = Closure::<dyn FnMut(Event)>::new(f);
            // non-passive so wheel and touch handlers can prevent scrolling
            let options = AddEventListenerOptions::new();
            options.set_passive(false);
            target.add_event_listener_with_callback_and_add_event_listener_options(
                kind,
                closure.as_ref().unchecked_ref(),
                &options,
            )?;
            Ok(Self { target: target.clone(), kind, closure })
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.kind, self.closure.as_ref().unchecked_ref());
        }
    }

    /// requestAnimationFrame loop that runs `tick` until it returns false or `stop` is called.
    struct FrameScheduler {
        window: Window,
        stopped: Rc<Cell<bool>>,
        pending: Rc<Cell<Option<i32>>>,
        _callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
    }

    impl FrameScheduler {
        fn start(window: Window, mut tick: impl FnMut(f64) -> bool + 'static) -> Result<Self, JsValue> {
            let stopped = Rc::new(Cell::new(false));
            let pending = Rc::new(Cell::new(None));
            let callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));

            let weak = Rc::downgrade(&callback);
            let (win, stop_flag, pending_id) = (window.clone(), stopped.clone(), pending.clone());
            *callback.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
                pending_id.set(None);
                if stop_flag.get() || !tick(timestamp) {
                    stop_flag.set(true);
                    return;
                }
                let Some(cb) = weak.upgrade() else { return };
                let cb = cb.borrow();
                let Some(cb) = cb.as_ref() else { return };
                match win.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(id) => pending_id.set(Some(id)),
                    Err(err) => {
                        tracing::error!(?err, "requestAnimationFrame failed");
                        stop_flag.set(true);
                    }
                }
            }));

            let first = match callback.borrow().as_ref() {
                Some(cb) => window.request_animation_frame(cb.as_ref().unchecked_ref())?,
                None => return Err(js_error("frame callback missing")),
            };
            pending.set(Some(first));

            Ok(Self { window, stopped, pending, _callback: callback })
        }

        fn stop(&self) {
            self.stopped.set(true);
            if let Some(id) = self.pending.take() {
                let _ = self.window.cancel_animation_frame(id);
            }
        }
    }

    impl Drop for FrameScheduler {
        fn drop(&mut self) {
            self.stop();
        }
    }

    /// Everything one running demo owns on the page.
    struct WebDemo {
        gpu: GpuContext,
        renderer: RenderState,
        demo: FrameLoopContext,
        egui_ctx: egui::Context,
        egui_events: Vec<egui::Event>,
        window: Window,
        document: Document,
        canvas: HtmlCanvasElement,
        container: HtmlElement,
        css_size: (f32, f32),
        pixel_ratio: f32,
        pointer: egui::Pos2,
    }

    impl WebDemo {
        fn dispatch(&mut self, event: InputEvent) {
            let response = self.demo.handle_input(&event);
            if response.request_pointer_lock {
                self.canvas.request_pointer_lock();
            }
            if response.release_pointer_lock {
                self.document.exit_pointer_lock();
            }
        }

        /// Canvas-relative position in CSS pixels.
        fn local(&self, client_x: f32, client_y: f32) -> egui::Pos2 {
            let rect = self.canvas.get_bounding_client_rect();
            egui::pos2(client_x - rect.left() as f32, client_y - rect.top() as f32)
        }

        /// Mark presses that land on an egui area so the scene ignores them.
        fn note_press(&mut self, pos: egui::Pos2) {
            self.demo.ui_wants_pointer = self.egui_ctx.wants_pointer_input() || self.egui_ctx.layer_id_at(pos).is_some();
        }

        fn egui_button(&mut self, pos: egui::Pos2, pressed: bool) {
            self.egui_events.push(egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed,
                modifiers: egui::Modifiers::default(),
            });
        }

        /// Match the canvas to its container at the device pixel ratio.
        fn fit_canvas(&mut self) -> (u32, u32) {
            let (mut w, mut h) = (self.container.client_width() as f32, self.container.client_height() as f32);
            if w <= 0.0 || h <= 0.0 {
                w = self.window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0) as f32;
                h = self.window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0) as f32;
            }
            self.pixel_ratio = self.window.device_pixel_ratio() as f32;
            self.css_size = (w, h);
            let physical = ((w * self.pixel_ratio) as u32, (h * self.pixel_ratio) as u32);
            let max = self.gpu.device.limits().max_texture_dimension_2d;
            let physical = (physical.0.clamp(1, max), physical.1.clamp(1, max));
            self.canvas.set_width(physical.0);
            self.canvas.set_height(physical.1);
            let style = self.canvas.style();
            let _ = style.set_property("width", &format!("{w}px"));
            let _ = style.set_property("height", &format!("{h}px"));
            physical
        }

        fn resize(&mut self) {
            let (w, h) = self.fit_canvas();
            self.gpu.resize(w, h);
            self.renderer.resize(&self.gpu.device, w, h);
            self.demo.resize(w, h);
            tracing::debug!(w, h, "canvas resized");
        }

        /// One frame; false ends the loop.
        fn frame(&mut self, timestamp_ms: f64) -> bool {
            if !self.demo.is_running() {
                return false;
            }
            let now = timestamp_ms / 1000.0;

            let mut raw_input = egui::RawInput {
                screen_rect: Some(egui::Rect::from_min_size(
                    egui::Pos2::ZERO,
                    egui::vec2(self.css_size.0, self.css_size.1),
                )),
                time: Some(now),
                events: std::mem::take(&mut self.egui_events),
                ..Default::default()
            };
            raw_input.viewports.entry(egui::ViewportId::ROOT).or_default().native_pixels_per_point =
                Some(self.pixel_ratio);

            let (output, actions) = ui::run(&self.egui_ctx, raw_input, &self.demo.ui_model());
            let dt = self.demo.clock.tick(now);
            let plan = self.demo.update(dt, &actions);
            self.demo.ui_wants_pointer = self.egui_ctx.wants_pointer_input();

            let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);
            let ui = EguiFrame {
                primitives,
                textures_delta: output.textures_delta,
                pixels_per_point: output.pixels_per_point,
            };
            if let Err(err) = self.renderer.draw_frame(&self.gpu, &plan, &self.demo.scene, ui) {
                tracing::error!(%err, "frame failed, stopping demo");
                self.demo.stop();
                return false;
            }
            true
        }
    }

    fn mount_canvas(document: &Document) -> Result<(HtmlElement, HtmlCanvasElement), JsValue> {
        let container = match document.get_element_by_id(CONTAINER_ID) {
            Some(el) => el.dyn_into::<HtmlElement>().map_err(|_| js_error("#viewer is not an HTML element"))?,
            None => document.body().ok_or_else(|| js_error("no body on document"))?,
        };
        let canvas = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        let _ = canvas.style().set_property("display", "block");
        let _ = canvas.style().set_property("touch-action", "none");
        container.append_child(&canvas)?;
        Ok((container, canvas))
    }

    fn install_listeners(shared: &Rc<RefCell<WebDemo>>) -> Result<Vec<Listener>, JsValue> {
        let (window, document, canvas) = {
            let s = shared.borrow();
            (s.window.clone(), s.document.clone(), s.canvas.clone())
        };
        let window_target: &EventTarget = window.as_ref();
        let document_target: &EventTarget = document.as_ref();
        let canvas_target: &EventTarget = canvas.as_ref();
        let mut listeners = Vec::new();

        let s = shared.clone();
        let keys = InputProcessor::default();
        listeners.push(Listener::add(document_target, "keydown", move |e| {
            let Some(e) = e.dyn_ref::<KeyboardEvent>() else { return };
            if keys.is_movement_key(&e.code()) {
                e.prevent_default();
            }
            s.borrow_mut().dispatch(keyboard_event_to_input(e, true));
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(document_target, "keyup", move |e| {
            let Some(e) = e.dyn_ref::<KeyboardEvent>() else { return };
            s.borrow_mut().dispatch(keyboard_event_to_input(e, false));
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(canvas_target, "mousedown", move |e| {
            let Some(e) = e.dyn_ref::<MouseEvent>() else { return };
            let mut st = s.borrow_mut();
            let pos = st.local(e.client_x() as f32, e.client_y() as f32);
            if !st.demo.input.pointer_locked {
                st.egui_button(pos, true);
            }
            st.note_press(pos);
            let mut event = mouse_click_to_input(e, true);
            if let InputEvent::MouseClick { x, y, .. } = &mut event {
                (*x, *y) = (pos.x, pos.y);
            }
            st.dispatch(event);
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(document_target, "mouseup", move |e| {
            let Some(e) = e.dyn_ref::<MouseEvent>() else { return };
            let mut st = s.borrow_mut();
            let pos = st.local(e.client_x() as f32, e.client_y() as f32);
            if !st.demo.input.pointer_locked {
                st.egui_button(pos, false);
            }
            st.dispatch(InputEvent::MouseClick {
                button: MouseButton::from_web_button(e.button()),
                is_down: false,
                x: pos.x,
                y: pos.y,
            });
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(document_target, "mousemove", move |e| {
            let Some(e) = e.dyn_ref::<MouseEvent>() else { return };
            let mut st = s.borrow_mut();
            let (dx, dy) = (e.movement_x() as f32, e.movement_y() as f32);
            if !st.demo.input.pointer_locked {
                let pos = st.local(e.client_x() as f32, e.client_y() as f32);
                st.pointer = pos;
                st.egui_events.push(egui::Event::PointerMoved(pos));
                st.dispatch(InputEvent::PointerMoved { x: pos.x, y: pos.y });
            }
            st.dispatch(InputEvent::MouseMove { dx, dy });
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(canvas_target, "wheel", move |e| {
            let Some(e) = e.dyn_ref::<WheelEvent>() else { return };
            e.prevent_default();
            let mut st = s.borrow_mut();
            // nothing in the panels scrolls, so the wheel only ever zooms
            if !st.egui_ctx.wants_pointer_input() {
                st.dispatch(mouse_wheel_to_input(e));
            }
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(canvas_target, "touchstart", move |e| {
            let Some(e) = e.dyn_ref::<TouchEvent>() else { return };
            e.prevent_default();
            let Some((x, y, touches)) = touch_point(e) else { return };
            let mut st = s.borrow_mut();
            let pos = st.local(x, y);
            st.pointer = pos;
            st.egui_events.push(egui::Event::PointerMoved(pos));
            st.egui_button(pos, true);
            st.note_press(pos);
            st.dispatch(InputEvent::TouchStart { x: pos.x, y: pos.y, touches });
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(canvas_target, "touchmove", move |e| {
            let Some(e) = e.dyn_ref::<TouchEvent>() else { return };
            e.prevent_default();
            let Some((x, y, touches)) = touch_point(e) else { return };
            let mut st = s.borrow_mut();
            let pos = st.local(x, y);
            st.pointer = pos;
            st.egui_events.push(egui::Event::PointerMoved(pos));
            st.dispatch(InputEvent::TouchMove { x: pos.x, y: pos.y, touches });
        })?);

        for kind in ["touchend", "touchcancel"] {
            let s = shared.clone();
            listeners.push(Listener::add(canvas_target, kind, move |e| {
                e.prevent_default();
                let mut st = s.borrow_mut();
                let pos = st.pointer;
                st.egui_button(pos, false);
                st.egui_events.push(egui::Event::PointerGone);
                st.dispatch(InputEvent::TouchEnd);
            })?);
        }

        listeners.push(Listener::add(canvas_target, "contextmenu", |e| e.prevent_default())?);

        let s = shared.clone();
        listeners.push(Listener::add(window_target, "blur", move |_| {
            s.borrow_mut().dispatch(InputEvent::FocusLost);
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(document_target, "visibilitychange", move |_| {
            let mut st = s.borrow_mut();
            let visible = !st.document.hidden();
            st.dispatch(InputEvent::VisibilityChanged { visible });
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(document_target, "pointerlockchange", move |_| {
            let mut st = s.borrow_mut();
            let locked = st.document.pointer_lock_element().is_some();
            st.dispatch(InputEvent::PointerLockChanged { locked });
        })?);

        let s = shared.clone();
        listeners.push(Listener::add(window_target, "resize", move |_| {
            s.borrow_mut().resize();
        })?);

        Ok(listeners)
    }

    /// A demo running on the page. Dropping it or calling `stop` tears it down.
    #[wasm_bindgen]
    pub struct DemoHandle {
        shared: Rc<RefCell<WebDemo>>,
        scheduler: FrameScheduler,
        listeners: Vec<Listener>,
    }

    #[wasm_bindgen]
    impl DemoHandle {
        /// Stop the frame loop and detach every listener.
        pub fn stop(&mut self) {
            self.scheduler.stop();
            self.listeners.clear();
            self.shared.borrow_mut().demo.stop();
        }

        /// Jump or animate to a named view preset.
        #[wasm_bindgen(js_name = setView)]
        pub fn set_view(&self, name: &str, animate: bool) -> Result<(), JsValue> {
            self.shared.borrow_mut().demo.set_view(name, animate).map_err(js_error)
        }

        /// Current overlay text ("Loading...", "Click to start!", errors).
        #[wasm_bindgen(getter)]
        pub fn status(&self) -> String {
            self.shared.borrow().demo.status().status_text()
        }
    }

    /// Start `demo` in `#viewer`, loading assets relative to `asset_root`.
    #[wasm_bindgen(js_name = startDemo)]
    pub async fn start_demo(demo: String, asset_root: Option<String>) -> Result<DemoHandle, JsValue> {
        let kind: DemoKind = demo.parse().map_err(js_error)?;
        let config = DemoConfig::builtin(kind);

        let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
        let document = window.document().ok_or_else(|| js_error("no document on window"))?;
        let (container, canvas) = mount_canvas(&document)?;
        let touch = is_touch_device(&window);

        let gpu = GpuContext::new(&canvas, 800, 600).await.map_err(js_error)?;
        let renderer = RenderState::new(&gpu, &config);
        let frame_ctx = FrameLoopContext::new(config, gpu.config.width, gpu.config.height, touch).map_err(js_error)?;

        let shared = Rc::new(RefCell::new(WebDemo {
            gpu,
            renderer,
            demo: frame_ctx,
            egui_ctx: egui::Context::default(),
            egui_events: Vec::new(),
            window: window.clone(),
            document,
            canvas,
            container,
            css_size: (800.0, 600.0),
            pixel_ratio: 1.0,
            pointer: egui::Pos2::ZERO,
        }));
        {
            let mut st = shared.borrow_mut();
            st.resize();
            st.demo.start_loading(asset_root.as_deref().unwrap_or(""));
        }

        let listeners = install_listeners(&shared)?;
        let s = shared.clone();
        let scheduler = FrameScheduler::start(window, move |timestamp| s.borrow_mut().frame(timestamp))?;

        tracing::info!(demo = %kind, touch, "demo started");
        Ok(DemoHandle { shared, scheduler, listeners })
    }

    thread_local! {
        static AUTO_START: RefCell<Option<DemoHandle>> = const { RefCell::new(None) };
    }

    /// Set up logging; start the demo named by `#viewer[data-demo]` if present.
    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();

        let requested = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(CONTAINER_ID))
            .and_then(|el| Some((el.get_attribute("data-demo")?, el.get_attribute("data-asset-root"))));
        if let Some((demo, asset_root)) = requested {
            let handle = start_demo(demo, asset_root).await?;
            AUTO_START.with(|slot| *slot.borrow_mut() = Some(handle));
        }
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::{start_demo, DemoHandle};
