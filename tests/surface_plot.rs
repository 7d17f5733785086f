use glam::DVec2;
use surface_plot::interaction::{Angles, DEFAULT_SCALE, DEFAULT_X_ANGLE, DEFAULT_Z_ANGLE};
use surface_plot::software::DrawCommand;
use surface_plot::{
    Backend, BackendPreference, Capability, LinkGroup, PlotError, Rgb, SampleGrid, SurfacePlot,
    SurfacePlotOptions, SurfaceRenderer,
};

fn grid_5x5() -> SampleGrid {
    let values = (0..25).map(|k| ((k / 5) * (k % 5)) as f64).collect();
    SampleGrid::new(5, 5, values).unwrap()
}

/// Row-major 0..24.
fn ramp_5x5() -> SampleGrid {
    SampleGrid::new(5, 5, (0..25).map(f64::from).collect()).unwrap()
}

fn software_plot_of(grid: SampleGrid, options: SurfacePlotOptions) -> SurfacePlot {
    let plot = SurfacePlot::with_capability(
        grid,
        options,
        Capability::Unavailable("no gpu in tests".to_string()),
    )
    .unwrap();
    plot.resize(400.0, 400.0);
    plot
}

fn software_plot(options: SurfacePlotOptions) -> SurfacePlot {
    software_plot_of(grid_5x5(), options)
}

fn polygon_distances(commands: &[DrawCommand]) -> Vec<f64> {
    commands
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Polygon { distance, .. } => Some(*distance),
            _ => None,
        })
        .collect()
}

fn angles(plot: &SurfacePlot) -> Angles {
    match &*plot.chart().unwrap() {
        SurfaceRenderer::Software(renderer) => renderer.angles(),
        SurfaceRenderer::Hardware(_) => panic!("expected the software renderer"),
    }
}

fn sample_position(plot: &SurfacePlot, index: usize) -> DVec2 {
    match &*plot.chart().unwrap() {
        SurfaceRenderer::Software(renderer) => renderer.points()[index].screen(),
        SurfaceRenderer::Hardware(_) => panic!("expected the software renderer"),
    }
}

#[test]
fn end_to_end_5x5_draws_every_cell() {
    let plot = software_plot(SurfacePlotOptions::default());
    assert_eq!(plot.backend(), Some(Backend::Software));

    let chart = plot.chart().unwrap();
    let SurfaceRenderer::Software(renderer) = &*chart else {
        panic!("expected the software renderer");
    };
    let list = renderer.draw_list();
    assert_eq!(list[0], DrawCommand::Background(Rgb::WHITE));

    let polygons = list
        .iter()
        .filter(|c| matches!(c, DrawCommand::Polygon { .. }))
        .count();
    assert_eq!(polygons, 16);
    assert_eq!(renderer.points().len(), 25);

    let distances: Vec<f64> = list.iter().filter_map(DrawCommand::distance).collect();
    assert!(distances.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn ramp_5x5_paints_nearest_quad_last() {
    let plot = software_plot_of(ramp_5x5(), SurfacePlotOptions::default());
    let chart = plot.chart().unwrap();
    let SurfaceRenderer::Software(renderer) = &*chart else {
        panic!("expected the software renderer");
    };
    assert_eq!(
        renderer.angles(),
        Angles {
            x: DEFAULT_X_ANGLE,
            z: DEFAULT_Z_ANGLE
        }
    );
    assert_eq!(renderer.angles(), Angles { x: 47.0, z: 47.0 });
    assert_eq!(renderer.scale(), DEFAULT_SCALE);
    assert_eq!(renderer.scale(), 350.0);

    let distances = polygon_distances(renderer.draw_list());
    assert_eq!(distances.len(), 16);
    let nearest = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let farthest = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(distances.last().copied(), Some(nearest));
    assert_eq!(distances.first().copied(), Some(farthest));
    assert!(nearest < farthest);
}

#[test]
fn nan_sample_never_claims_a_distant_tooltip() {
    let mut values: Vec<f64> = (0..25).map(f64::from).collect();
    values[0] = f64::NAN;
    let grid = SampleGrid::new(5, 5, values).unwrap();
    let options = SurfacePlotOptions::builder()
        .show_tooltips(true)
        .tooltips((0..25).map(|i| format!("s{i}")).collect())
        .build();
    let plot = software_plot_of(grid, options);

    plot.pointer_moved(DVec2::new(-5000.0, -5000.0));
    assert!(plot.tooltip().is_none());

    let target = sample_position(&plot, 12);
    plot.pointer_moved(target);
    assert_eq!(plot.tooltip().map(|t| t.index), Some(12));
}

#[test]
fn linked_plots_follow_a_rotating_drag() {
    let group = LinkGroup::new();
    let a = software_plot(SurfacePlotOptions::default());
    let b = software_plot(SurfacePlotOptions::default());
    a.link(&group);
    b.link(&group);
    assert_eq!(group.len(), 2);

    assert!(a.pointer_down(DVec2::new(100.0, 100.0), false));
    assert!(a.pointer_moved(DVec2::new(110.0, 105.0)));
    a.pointer_up();

    let expected = Angles {
        x: DEFAULT_X_ANGLE - 5.0,
        z: DEFAULT_Z_ANGLE - 10.0,
    };
    assert_eq!(angles(&a), expected);

    // the source never receives its own step
    assert!(!a.on_animation_frame());
    assert!(b.on_animation_frame());
    assert_eq!(angles(&b), expected);
    assert_eq!(angles(&a), expected);
}

#[test]
fn rotate_does_not_propagate() {
    let group = LinkGroup::new();
    let a = software_plot(SurfacePlotOptions::default());
    let b = software_plot(SurfacePlotOptions::default());
    a.link(&group);
    b.link(&group);

    a.rotate(3.0, 4.0);
    assert!(!b.on_animation_frame());
    assert_eq!(angles(&b), Angles::default());
}

#[test]
fn unlinked_plot_stops_following() {
    let group = LinkGroup::new();
    let a = software_plot(SurfacePlotOptions::default());
    let b = software_plot(SurfacePlotOptions::default());
    a.link(&group);
    b.link(&group);
    b.unlink();
    assert!(!b.is_linked());
    assert_eq!(group.len(), 1);

    a.pointer_down(DVec2::new(0.0, 0.0), false);
    a.pointer_moved(DVec2::new(20.0, 0.0));
    assert!(!b.on_animation_frame());
    assert_eq!(angles(&b), Angles::default());
}

#[test]
fn clean_up_is_idempotent() {
    let group = LinkGroup::new();
    let plot = software_plot(SurfacePlotOptions::default());
    plot.link(&group);

    plot.clean_up();
    plot.clean_up();
    assert!(plot.is_disposed());
    assert!(plot.backend().is_none());
    assert!(plot.chart().is_none());
    assert!(group.is_empty());

    // everything after teardown is a no-op
    plot.redraw();
    plot.rotate(1.0, 1.0);
    assert!(!plot.pointer_down(DVec2::ZERO, false));
    assert!(!plot.pointer_moved(DVec2::new(5.0, 5.0)));
    assert!(!plot.on_animation_frame());
    assert!(!plot.resize(100.0, 100.0));
    assert!(plot.tooltip().is_none());

    assert_eq!(plot.set_data(grid_5x5()), Err(PlotError::Disposed));
}

#[test]
fn requested_hardware_falls_back_with_error() {
    let options = SurfacePlotOptions::builder()
        .backend(BackendPreference::Hardware)
        .build();
    let plot = software_plot(options);
    assert_eq!(plot.backend(), Some(Backend::Software));
    assert_eq!(
        plot.last_error(),
        Some(PlotError::HardwareUnavailable("no gpu in tests".to_string()))
    );
}

#[test]
fn auto_preference_falls_back_quietly() {
    let plot = software_plot(SurfacePlotOptions::default());
    assert_eq!(plot.backend(), Some(Backend::Software));
    assert!(plot.last_error().is_none());
}

#[test]
fn empty_gradient_is_rejected() {
    let options = SurfacePlotOptions::builder().colour_gradient(vec![]).build();
    let result = SurfacePlot::with_capability(
        grid_5x5(),
        options,
        Capability::Unavailable("no gpu in tests".to_string()),
    );
    assert!(matches!(result, Err(PlotError::EmptyGradient)));
}

#[test]
fn tooltip_follows_pointer() {
    let options = SurfacePlotOptions::builder()
        .show_tooltips(true)
        .tooltips((0..25).map(|i| format!("sample {i}")).collect())
        .build();
    let plot = software_plot(options);

    let target = sample_position(&plot, 7);
    assert!(plot.pointer_moved(target));
    assert_eq!(plot.tooltip().map(|t| t.text), Some("sample 7".to_string()));

    plot.pointer_moved(DVec2::new(-500.0, -500.0));
    assert!(plot.tooltip().is_none());

    plot.pointer_moved(target);
    assert!(plot.pointer_left());
    assert!(plot.tooltip().is_none());
    assert!(!plot.pointer_left());
}

#[test]
fn set_data_replaces_surface() {
    let plot = software_plot(SurfacePlotOptions::default());
    let grid = SampleGrid::from_rows(vec![vec![0.0, 1.0, 2.0], vec![2.0, 1.0, 0.0]]).unwrap();
    plot.set_data(grid).unwrap();

    // the new renderer is sized on the next draw
    assert!(plot.resize(400.0, 400.0));
    match &*plot.chart().unwrap() {
        SurfaceRenderer::Software(renderer) => {
            assert_eq!(renderer.points().len(), 6);
            let polygons = renderer
                .draw_list()
                .iter()
                .filter(|c| matches!(c, DrawCommand::Polygon { .. }))
                .count();
            assert_eq!(polygons, 2);
        }
        SurfaceRenderer::Hardware(_) => panic!("expected the software renderer"),
    }
}
