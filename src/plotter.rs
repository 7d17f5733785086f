use crate::capability::{self, Backend, BackendPreference, Capability};
use crate::colormap::{ColormapName, Rgb};
use crate::error::{PlotError, Result};
use crate::geometry::NormalMode;
use crate::grid::SampleGrid;
use crate::hardware::{HardwareRenderer, HardwareSettings};
use crate::hover::Tooltip;
use crate::interaction::{Angles, DEFAULT_X_ANGLE, DEFAULT_Z_ANGLE, DragMode};
use crate::label::{AxisTitles, LabelRasterizer};
use crate::link::{LinkBinding, LinkGroup, RotationDelta};
use crate::pipeline::RELEASED_PLOTS;
use crate::shader::FaultSlot;
use crate::software::{SoftwareRenderer, SoftwareSettings};

use bon::Builder;
use glam::DVec2;
use iced::widget::{canvas, container, shader};
use iced::{Element, Length};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// ================================================================================
// Options
// ================================================================================

/// Settings that only the hardware renderer reads.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareOptions {
    /// Divide z by its nice maximum and label the z axis 0 to that maximum
    #[builder(default = true)]
    pub auto_z_scale: bool,
    /// Tick labels along x. Empty means `0..rows`.
    #[builder(default)]
    pub x_labels: Vec<String>,
    /// Tick labels along y. Empty means `0..cols`.
    #[builder(default)]
    pub y_labels: Vec<String>,
    /// Tick labels along z, used when `auto_z_scale` is off
    #[builder(default)]
    pub z_labels: Vec<String>,
    #[builder(default)]
    pub normal_mode: NormalMode,
}

impl Default for HardwareOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything a caller can configure on a [`SurfacePlot`].
///
/// Unset fields take their defaults, both through the builder and when
/// deserialising a partial document.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfacePlotOptions {
    /// Horizontal shift of the plot centre inside the widget
    #[builder(default)]
    pub x_pos: f32,
    /// Vertical shift of the plot centre inside the widget
    #[builder(default)]
    pub y_pos: f32,
    /// Fixed widget width. Fills the available space when unset.
    pub width: Option<f32>,
    /// Fixed widget height. Fills the available space when unset.
    pub height: Option<f32>,
    /// Explicit gradient stops, overriding `colormap`
    pub colour_gradient: Option<Vec<Rgb>>,
    #[builder(default)]
    pub colormap: ColormapName,
    #[builder(default, into)]
    pub x_title: String,
    #[builder(default, into)]
    pub y_title: String,
    #[builder(default, into)]
    pub z_title: String,
    #[builder(default = Rgb::WHITE)]
    pub background: Rgb,
    #[builder(default = Rgb::BLACK)]
    pub axis_text_colour: Rgb,
    #[builder(default = Rgb::BLACK)]
    pub tooltip_colour: Rgb,
    #[builder(default = true)]
    pub fill_polygons: bool,
    #[builder(default)]
    pub show_tooltips: bool,
    /// Tooltip text per sample, row-major
    #[builder(default)]
    pub tooltips: Vec<String>,
    #[builder(default)]
    pub render_points: bool,
    /// Skip cells whose corners all sit on the minimum z
    #[builder(default)]
    pub hide_flat_min_polygons: bool,
    /// Divide z by the nice number at or above the largest sample
    #[builder(default = true)]
    pub global_z_scale: bool,
    /// Fixed screen position of the plot centre, overriding `x_pos`/`y_pos`
    pub origin: Option<[f64; 2]>,
    #[builder(default = DEFAULT_X_ANGLE)]
    pub start_x_angle: f64,
    #[builder(default = DEFAULT_Z_ANGLE)]
    pub start_z_angle: f64,
    /// Height of the z title along the z axis, 0 at the base and 1 at the top
    #[builder(default = 0.5)]
    pub z_axis_text_position: f64,
    #[builder(default)]
    pub backend: BackendPreference,
    #[builder(default)]
    pub hardware: HardwareOptions,
}

impl Default for SurfacePlotOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SurfacePlotOptions {
    /// Gradient stops in use: the explicit gradient when set, else the colormap.
    pub fn gradient_stops(&self) -> Result<Vec<Rgb>> {
        match &self.colour_gradient {
            Some(stops) if stops.is_empty() => Err(PlotError::EmptyGradient),
            Some(stops) => Ok(stops.clone()),
            None => Ok(self.colormap.stops()),
        }
    }

    pub fn titles(&self) -> AxisTitles {
        AxisTitles {
            x: self.x_title.clone(),
            y: self.y_title.clone(),
            z: self.z_title.clone(),
        }
    }

    pub fn software_settings(&self) -> SoftwareSettings {
        SoftwareSettings {
            background: self.background,
            axis_text_colour: self.axis_text_colour,
            titles: self.titles(),
            fill_polygons: self.fill_polygons,
            render_points: self.render_points,
            hide_flat_min_polygons: self.hide_flat_min_polygons,
            global_z_scale: self.global_z_scale,
            tooltips: self.show_tooltips.then(|| self.tooltips.clone()),
            origin: self.origin.map(DVec2::from),
            offset: DVec2::new(f64::from(self.x_pos), f64::from(self.y_pos)),
            start_angles: Angles {
                x: self.start_x_angle,
                z: self.start_z_angle,
            },
            z_axis_text_position: self.z_axis_text_position,
        }
    }

    pub fn hardware_settings(&self) -> HardwareSettings {
        HardwareSettings {
            auto_z_scale: self.hardware.auto_z_scale,
            x_labels: self.hardware.x_labels.clone(),
            y_labels: self.hardware.y_labels.clone(),
            z_labels: self.hardware.z_labels.clone(),
            titles: self.titles(),
            axis_text_colour: self.axis_text_colour,
            normal_mode: self.hardware.normal_mode,
        }
    }
}

/// Backend for `preference` given the probe result, plus the error to keep
/// when the caller asked for hardware and cannot have it.
pub fn choose_backend(
    preference: BackendPreference,
    capability: &Capability,
) -> (Backend, Option<PlotError>) {
    match (preference, capability) {
        (BackendPreference::Software, _) => (Backend::Software, None),
        (_, Capability::Capable { .. }) => (Backend::Hardware, None),
        (BackendPreference::Auto, Capability::Unavailable(_)) => (Backend::Software, None),
        (BackendPreference::Hardware, Capability::Unavailable(reason)) => {
            tracing::warn!(%reason, "hardware renderer requested but unavailable, using software");
            (
                Backend::Software,
                Some(PlotError::HardwareUnavailable(reason.clone())),
            )
        }
    }
}

// ================================================================================
// Renderer
// ================================================================================

/// The renderer behind a live plot.
#[derive(Debug)]
pub enum SurfaceRenderer {
    Software(SoftwareRenderer),
    Hardware(HardwareRenderer),
}

impl SurfaceRenderer {
    pub fn backend(&self) -> Backend {
        match self {
            SurfaceRenderer::Software(_) => Backend::Software,
            SurfaceRenderer::Hardware(_) => Backend::Hardware,
        }
    }

    pub fn drag_mode(&self) -> DragMode {
        match self {
            SurfaceRenderer::Software(renderer) => renderer.drag_mode(),
            SurfaceRenderer::Hardware(renderer) => renderer.drag_mode(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        match self {
            SurfaceRenderer::Software(renderer) => renderer.is_disposed(),
            SurfaceRenderer::Hardware(renderer) => renderer.is_disposed(),
        }
    }

    fn redraw(&mut self) {
        match self {
            SurfaceRenderer::Software(renderer) => renderer.redraw(),
            SurfaceRenderer::Hardware(renderer) => renderer.redraw(),
        }
    }

    fn rotate(&mut self, dx: f64, dy: f64) {
        match self {
            SurfaceRenderer::Software(renderer) => renderer.rotate(dx, dy),
            SurfaceRenderer::Hardware(renderer) => renderer.rotate(dx, dy),
        }
    }

    fn dispose(&mut self) {
        match self {
            SurfaceRenderer::Software(renderer) => renderer.dispose(),
            SurfaceRenderer::Hardware(renderer) => renderer.dispose(),
        }
    }

    fn build(
        backend: Backend,
        grid: &SampleGrid,
        stops: Vec<Rgb>,
        options: &SurfacePlotOptions,
    ) -> Result<Self> {
        Ok(match backend {
            Backend::Software => SurfaceRenderer::Software(SoftwareRenderer::new(
                grid,
                stops,
                options.software_settings(),
            )?),
            Backend::Hardware => SurfaceRenderer::Hardware(HardwareRenderer::new(
                grid,
                stops,
                options.hardware_settings(),
                LabelRasterizer::system(),
            )?),
        })
    }
}

// ================================================================================
// Surface plot
// ================================================================================

static NEXT_PLOT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct PlotInner {
    id: u64,
    grid: SampleGrid,
    options: SurfacePlotOptions,
    stops: Vec<Rgb>,
    capability: Capability,
    renderer: Option<SurfaceRenderer>,
    link: Option<LinkBinding>,
    last_error: Option<PlotError>,
    fault: FaultSlot,
}

impl PlotInner {
    /// Tear down the renderer. A hardware plot also hands its GPU resources
    /// back to the pipeline.
    fn dispose_renderer(&mut self) -> bool {
        let Some(mut renderer) = self.renderer.take() else {
            return false;
        };
        if renderer.backend() == Backend::Hardware {
            RELEASED_PLOTS.release(self.id);
        }
        renderer.dispose();
        true
    }

    /// Switch to software if the pipeline reported a fault. Returns whether it did.
    fn take_fault(&mut self) -> bool {
        let fault = self.fault.lock().ok().and_then(|mut slot| slot.take());
        match fault {
            Some(err) => self.fall_back(err),
            None => false,
        }
    }

    fn fall_back(&mut self, err: PlotError) -> bool {
        if !matches!(self.renderer, Some(SurfaceRenderer::Hardware(_))) {
            return false;
        }
        tracing::warn!(%err, plot = self.id, "hardware rendering failed, switching to software");
        self.dispose_renderer();
        self.last_error = Some(err);
        if let Some(link) = &self.link {
            link.set_additive(true);
        }

        let settings = self.options.software_settings();
        match SoftwareRenderer::new(&self.grid, self.stops.clone(), settings) {
            Ok(renderer) => self.renderer = Some(SurfaceRenderer::Software(renderer)),
            Err(err) => {
                tracing::error!(%err, plot = self.id, "software fallback failed");
                self.last_error = Some(err);
            }
        }
        true
    }
}

/// A 3D surface plot widget.
///
/// Call [`SurfacePlot::draw`] from your view to embed it. The plot is cheap to
/// borrow from the view because all mutable state lives behind a `RefCell`.
///
/// # Example
///
/// ```ignore
/// let grid = SampleGrid::from_rows(vec![vec![0.0, 1.0], vec![1.0, 2.0]])?;
/// let plot = SurfacePlot::new(grid, SurfacePlotOptions::default())?;
/// plot.draw()
/// ```
#[derive(Debug)]
pub struct SurfacePlot {
    inner: Rc<RefCell<PlotInner>>,
}

impl SurfacePlot {
    /// Build a plot, probing for hardware support unless software was requested.
    pub fn new(grid: SampleGrid, options: SurfacePlotOptions) -> Result<Self> {
        let capability = match options.backend {
            BackendPreference::Software => {
                Capability::Unavailable("software renderer requested".to_string())
            }
            _ => capability::probe(),
        };
        Self::with_capability(grid, options, capability)
    }

    /// Build a plot against an already known probe result.
    pub fn with_capability(
        grid: SampleGrid,
        options: SurfacePlotOptions,
        capability: Capability,
    ) -> Result<Self> {
        let stops = options.gradient_stops()?;
        let (backend, last_error) = choose_backend(options.backend, &capability);
        let renderer = SurfaceRenderer::build(backend, &grid, stops.clone(), &options)?;
        let id = NEXT_PLOT_ID.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            plot = id,
            ?backend,
            rows = grid.rows(),
            cols = grid.cols(),
            "surface plot created"
        );

        Ok(Self {
            inner: Rc::new(RefCell::new(PlotInner {
                id,
                grid,
                options,
                stops,
                capability,
                renderer: Some(renderer),
                link: None,
                last_error,
                fault: FaultSlot::default(),
            })),
        })
    }

    /// Widget for this plot: a canvas in software mode, a shader otherwise.
    pub fn draw<'a, Message>(&'a self) -> Element<'a, Message>
    where
        Message: 'a,
    {
        let inner = self.inner.borrow();
        let width = inner.options.width.map_or(Length::Fill, Length::Fixed);
        let height = inner.options.height.map_or(Length::Fill, Length::Fixed);
        let background: iced::Color = inner.options.background.into();
        let hardware = matches!(inner.renderer, Some(SurfaceRenderer::Hardware(_)));
        drop(inner);

        if hardware {
            container(shader(self).width(Length::Fill).height(Length::Fill))
                .style(move |_theme| container::Style::default().background(background))
                .width(width)
                .height(height)
                .into()
        } else {
            canvas(self).width(width).height(height).into()
        }
    }

    /// Rebuild the frame from the current data and view.
    pub fn redraw(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.take_fault();
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.redraw();
        }
    }

    /// Rotate by a drag step of `(dx, dy)` pixels without telling linked plots.
    ///
    /// The frame is not rebuilt here; call [`SurfacePlot::redraw`] or wait for
    /// the next event that repaints.
    pub fn rotate(&self, dx: f64, dy: f64) {
        if let Some(renderer) = self.inner.borrow_mut().renderer.as_mut() {
            renderer.rotate(dx, dy);
        }
    }

    /// Replace the plotted data, keeping the current view.
    pub fn set_data(&self, grid: SampleGrid) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let Some(current) = inner.renderer.as_ref() else {
            return Err(PlotError::Disposed);
        };

        let mut renderer =
            SurfaceRenderer::build(current.backend(), &grid, inner.stops.clone(), &inner.options)?;
        match (current, &mut renderer) {
            (SurfaceRenderer::Software(old), SurfaceRenderer::Software(new)) => {
                new.set_view(old.angles(), old.scale());
                new.redraw();
            }
            (SurfaceRenderer::Hardware(old), SurfaceRenderer::Hardware(new)) => {
                new.set_rotation(old.rotation());
            }
            _ => {}
        }

        if let Some(mut old) = inner.renderer.replace(renderer) {
            old.dispose();
        }
        tracing::debug!(plot = inner.id, rows = grid.rows(), cols = grid.cols(), "data replaced");
        inner.grid = grid;
        Ok(())
    }

    /// Join `group`, leaving any group this plot was in.
    pub fn link(&self, group: &LinkGroup) {
        let mut inner = self.inner.borrow_mut();
        if inner.renderer.is_none() {
            return;
        }
        if let Some(old) = inner.link.take() {
            old.leave();
        }
        // Software angles add up, so a software member keeps one summed step
        let additive = matches!(inner.renderer, Some(SurfaceRenderer::Software(_)));
        inner.link = Some(LinkBinding::join(group, additive));
    }

    pub fn unlink(&self) {
        if let Some(link) = self.inner.borrow_mut().link.take() {
            link.leave();
        }
    }

    pub fn is_linked(&self) -> bool {
        self.inner.borrow().link.is_some()
    }

    /// Release the renderer and leave any link group. Safe to call repeatedly.
    pub fn clean_up(&self) {
        let mut inner = self.inner.borrow_mut();
        if let Some(link) = inner.link.take() {
            link.leave();
        }
        if inner.dispose_renderer() {
            tracing::debug!(plot = inner.id, "surface plot cleaned up");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().renderer.is_none()
    }

    /// Backend in use, `None` once cleaned up.
    pub fn backend(&self) -> Option<Backend> {
        self.inner.borrow().renderer.as_ref().map(SurfaceRenderer::backend)
    }

    pub fn capability(&self) -> Capability {
        self.inner.borrow().capability.clone()
    }

    /// The most recent hardware failure, if any.
    pub fn last_error(&self) -> Option<PlotError> {
        self.inner.borrow().last_error.clone()
    }

    /// The renderer, for inspecting its current frame.
    pub fn chart(&self) -> Option<Ref<'_, SurfaceRenderer>> {
        Ref::filter_map(self.inner.borrow(), |inner| inner.renderer.as_ref()).ok()
    }

    pub fn options(&self) -> Ref<'_, SurfacePlotOptions> {
        Ref::map(self.inner.borrow(), |inner| &inner.options)
    }

    /// The tooltip under the pointer, software mode only.
    pub fn tooltip(&self) -> Option<Tooltip> {
        match self.inner.borrow().renderer.as_ref()? {
            SurfaceRenderer::Software(renderer) => renderer.tooltip().cloned(),
            SurfaceRenderer::Hardware(_) => None,
        }
    }

    /// Report the widget size. Returns whether the frame was rebuilt.
    pub fn resize(&self, width: f64, height: f64) -> bool {
        match self.inner.borrow_mut().renderer.as_mut() {
            Some(SurfaceRenderer::Software(renderer)) => renderer.resize(width, height),
            _ => false,
        }
    }

    /// Start a drag. `scale_mode` zooms instead of rotating.
    pub fn pointer_down(&self, position: DVec2, scale_mode: bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.take_fault();
        match inner.renderer.as_mut() {
            Some(SurfaceRenderer::Software(renderer)) => renderer.pointer_down(position, scale_mode),
            Some(SurfaceRenderer::Hardware(renderer)) => renderer.pointer_down(position, scale_mode),
            None => false,
        }
    }

    /// Track the pointer. Returns whether the plot needs to be redrawn.
    ///
    /// Rotation steps are forwarded to linked plots.
    pub fn pointer_moved(&self, position: DVec2) -> bool {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let Some(renderer) = inner.renderer.as_mut() else {
            return false;
        };

        let (delta, tooltip_changed) = match renderer {
            SurfaceRenderer::Software(renderer) => {
                let before = renderer.tooltip().cloned();
                let delta = renderer.pointer_moved(position);
                (delta, renderer.tooltip() != before.as_ref())
            }
            SurfaceRenderer::Hardware(renderer) => (renderer.pointer_moved(position), false),
        };

        if let Some(delta) = delta {
            if renderer.drag_mode() == DragMode::Rotating {
                if let Some(link) = &inner.link {
                    link.broadcast(RotationDelta {
                        dx: delta.step.x,
                        dy: delta.step.y,
                    });
                }
            }
            return true;
        }
        tooltip_changed
    }

    pub fn pointer_up(&self) -> DragMode {
        match self.inner.borrow_mut().renderer.as_mut() {
            Some(SurfaceRenderer::Software(renderer)) => renderer.pointer_up(),
            Some(SurfaceRenderer::Hardware(renderer)) => renderer.pointer_up(),
            None => DragMode::Idle,
        }
    }

    /// The pointer left the widget. Returns whether a tooltip was hidden.
    pub fn pointer_left(&self) -> bool {
        match self.inner.borrow_mut().renderer.as_mut() {
            Some(SurfaceRenderer::Software(renderer)) => {
                let shown = renderer.tooltip().is_some();
                renderer.pointer_left();
                shown
            }
            _ => false,
        }
    }

    /// Per-frame work: pick up pipeline faults and rotations from linked plots.
    ///
    /// Returns whether another frame should be requested. A live hardware plot
    /// always asks for one; a software plot only when something changed.
    pub fn on_animation_frame(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        let fell_back = inner.take_fault();
        let deltas = inner
            .link
            .as_ref()
            .map(LinkBinding::drain)
            .unwrap_or_default();
        let Some(renderer) = inner.renderer.as_mut() else {
            return fell_back;
        };

        for delta in &deltas {
            renderer.rotate(delta.dx, delta.dy);
        }
        let rotated = !deltas.is_empty();
        match renderer {
            SurfaceRenderer::Software(renderer) => {
                if rotated {
                    renderer.redraw();
                }
                fell_back || rotated
            }
            // The hardware loop keeps running until the renderer is disposed
            SurfaceRenderer::Hardware(renderer) => renderer.on_animation_frame() || fell_back,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub(crate) fn fault_slot(&self) -> FaultSlot {
        self.inner.borrow().fault.clone()
    }

    pub(crate) fn with_software<R>(&self, f: impl FnOnce(&SoftwareRenderer) -> R) -> Option<R> {
        match self.inner.borrow().renderer.as_ref()? {
            SurfaceRenderer::Software(renderer) => Some(f(renderer)),
            SurfaceRenderer::Hardware(_) => None,
        }
    }

    pub(crate) fn with_hardware<R>(&self, f: impl FnOnce(&HardwareRenderer) -> R) -> Option<R> {
        match self.inner.borrow().renderer.as_ref()? {
            SurfaceRenderer::Hardware(renderer) => Some(f(renderer)),
            SurfaceRenderer::Software(_) => None,
        }
    }
}

impl Drop for SurfacePlot {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            if let Some(link) = inner.link.take() {
                link.leave();
            }
            inner.dispose_renderer();
        }
    }
}
