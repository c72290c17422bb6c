//! Render sink seam.
//!
//! A sink draws whatever it is handed and never mutates the model. The bridge
//! here owns the sink inside a series listener, so every model notification
//! becomes exactly one `set_data` + `set_gauge` pair.

use crate::domain::log::{compute_rate_with, to_points, ListenerId, Point, RateScale, SeriesModel};

/// A chart (line series + gauge) that the model pushes into.
pub trait RenderSink {
    /// Replace the plotted series with `points`, ordered by `x`.
    fn set_data(&mut self, points: &[Point]);

    /// Update the gauge with the current rate metric.
    fn set_gauge(&mut self, value: f64);
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn set_data(&mut self, points: &[Point]) {
        (**self).set_data(points)
    }

    fn set_gauge(&mut self, value: f64) {
        (**self).set_gauge(value)
    }
}

/// Subscribe `sink` to `model`. Drop the binding with
/// [`SeriesModel::unsubscribe`].
pub fn attach<S: RenderSink + 'static>(model: &mut SeriesModel, mut sink: S) -> ListenerId {
    let scale: RateScale = model.rate_scale();
    model.subscribe(move |entries| {
        sink.set_data(&to_points(entries));
        sink.set_gauge(compute_rate_with(entries, scale));
    })
}
