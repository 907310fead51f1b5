// Point-cloud scene: full-replace rebuilds and a display-rate render loop.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::model::PointCloudMessage;

/// Render loop period (~60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle of an object attached to a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

/// A point set with a flat `[x0, y0, z0, x1, y1, z1, ...]` position buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    positions: Vec<f32>,
    pub color: u32,
    pub point_size: f32,
}

impl PointCloud {
    /// Build a fresh position buffer, three floats per point.
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut positions = Vec::with_capacity(points.len() * 3);
        for p in points {
            positions.extend_from_slice(p);
        }
        Self {
            positions,
            color: 0x00ff00,
            point_size: 0.01,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.positions.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty cloud.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let mut iter = self.points();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(mut lo, mut hi), p| {
            for i in 0..3 {
                lo[i] = lo[i].min(p[i]);
                hi[i] = hi[i].max(p[i]);
            }
            (lo, hi)
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    PointLight { position: [f32; 3], intensity: f32 },
    Points(PointCloud),
}

/// Perspective camera looking down -Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 50.0,
            position: [0.0, 0.0, 3.0],
        }
    }
}

impl Camera {
    /// Project a world point to normalized device coordinates (`-1..=1` on
    /// both axes). Points outside the near/far range are culled.
    pub fn project(&self, point: [f32; 3], aspect: f32) -> Option<(f32, f32)> {
        let dx = point[0] - self.position[0];
        let dy = point[1] - self.position[1];
        let depth = self.position[2] - point[2];
        if depth < self.near || depth > self.far {
            return None;
        }
        let f = 1.0 / (self.fov_degrees.to_radians() / 2.0).tan();
        let x = dx * f / (aspect * depth);
        let y = dy * f / depth;
        if x.abs() > 1.0 || y.abs() > 1.0 {
            return None;
        }
        Some((x, y))
    }
}

/// The objects currently attached for rendering.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<(ObjectId, SceneObject)>,
    next_id: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push((id, object));
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let idx = self.objects.iter().position(|(oid, _)| *oid == id)?;
        Some(self.objects.remove(idx).1)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().map(|(_, o)| o)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of point-cloud objects attached.
    pub fn point_cloud_count(&self) -> usize {
        self.objects()
            .filter(|o| matches!(o, SceneObject::Points(_)))
            .count()
    }
}

/// Scene, camera and the handle of the currently committed cloud.
#[derive(Debug)]
pub struct Visualizer {
    pub scene: Scene,
    pub camera: Camera,
    cloud: Option<ObjectId>,
    commits: u64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer {
    pub fn new() -> Self {
        let mut scene = Scene::new();
        scene.add(SceneObject::PointLight {
            position: [2.0, 2.0, 2.0],
            intensity: 1.0,
        });
        Self {
            scene,
            camera: Camera::default(),
            cloud: None,
            commits: 0,
        }
    }

    /// Replace the rendered cloud with the one in `msg`.
    ///
    /// Messages without `points` are ignored and leave the current cloud in place.
    pub fn apply(&mut self, msg: &PointCloudMessage) -> bool {
        let Some(points) = msg.points.as_deref() else {
            return false;
        };
        let cloud = PointCloud::from_points(points);
        metrics::POINT_CLOUD_POINTS.set(cloud.len() as i64);

        if let Some(old) = self.cloud.take() {
            self.scene.remove(old);
        }
        self.cloud = Some(self.scene.add(SceneObject::Points(cloud)));
        self.commits += 1;
        true
    }

    /// Parse and apply one visualizer text frame. Malformed frames are dropped.
    pub fn apply_text(&mut self, text: &str) -> bool {
        match serde_json::from_str::<PointCloudMessage>(text) {
            Ok(msg) => self.apply(&msg),
            Err(e) => {
                tracing::debug!("dropping malformed visualizer frame: {e}");
                false
            }
        }
    }

    /// The latest committed cloud, if any.
    pub fn current(&self) -> Option<&PointCloud> {
        let id = self.cloud?;
        self.scene.objects.iter().find_map(|(oid, o)| match o {
            SceneObject::Points(cloud) if *oid == id => Some(cloud),
            _ => None,
        })
    }

    /// How many clouds have been committed so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

/// Draws a scene once per frame.
pub trait Renderer: Send {
    fn render(&mut self, scene: &Scene, camera: &Camera);
}

/// Renders the scene into a character grid, one `*` per occupied cell.
#[derive(Debug, Clone)]
pub struct AsciiRenderer {
    pub cols: usize,
    pub rows: usize,
    frames: u64,
    last: Vec<String>,
}

impl AsciiRenderer {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
            frames: 0,
            last: Vec::new(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The most recent frame, one string per row.
    pub fn last_frame(&self) -> &[String] {
        &self.last
    }
}

impl Renderer for AsciiRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        let mut grid = vec![vec![' '; self.cols]; self.rows];
        // Terminal cells are roughly twice as tall as wide.
        let aspect = self.cols as f32 / (self.rows as f32 * 2.0);

        for object in scene.objects() {
            let SceneObject::Points(cloud) = object else {
                continue;
            };
            for p in cloud.points() {
                if let Some((x, y)) = camera.project(p, aspect) {
                    let col = (((x + 1.0) / 2.0) * (self.cols - 1) as f32).round() as usize;
                    let row = (((1.0 - y) / 2.0) * (self.rows - 1) as f32).round() as usize;
                    grid[row.min(self.rows - 1)][col.min(self.cols - 1)] = '*';
                }
            }
        }

        self.last = grid.into_iter().map(|r| r.into_iter().collect()).collect();
        self.frames += 1;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Render the latest committed scene every frame until `cancel` fires,
/// independent of how often new clouds arrive.
pub async fn run_render_loop<R: Renderer>(
    visualizer: Arc<Mutex<Visualizer>>,
    renderer: Arc<Mutex<R>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let viz = lock(&visualizer);
        lock(&renderer).render(&viz.scene, &viz.camera);
    }
    tracing::debug!("render loop stopped");
}
