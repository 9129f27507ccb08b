//! Real-world object tracking.
//!
//! A tracker either broadcasts simulated object poses after every simulation
//! step, or ingests poses observed in the real world ("live"), in which case
//! reset adopts the tracked poses instead of sampling an initial state.
//!
//! [`ChannelTracker`] moves pose batches over bounded crossbeam channels; the
//! other end is a [`TrackerHandle`] owned by whatever talks to the outside
//! world (a perception process, a visualizer, a logger).

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::{ObjectTrackerConfig, TrackerMode};
use crate::math::Pose;
use crate::objects::ObjectRegistry;
use crate::physics::PhysicsEngine;

/// Object poses at one instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseBatch {
    pub seq: u64,
    pub poses: Vec<(String, Pose)>,
}

/// Pose source or sink attached to the scene.
pub trait ObjectTracker<P: PhysicsEngine> {
    /// True if poses come from the real world.
    fn is_live(&self) -> bool;

    /// Overwrite simulated poses with the latest tracked ones.
    /// Returns the number of objects updated.
    fn update_poses(&mut self, objects: &ObjectRegistry, physics: &mut P) -> usize;

    /// Publish the current simulated poses.
    fn send_poses(&mut self, objects: &ObjectRegistry, physics: &P);
}

/// External end of a [`ChannelTracker`].
#[derive(Clone, Debug)]
pub struct TrackerHandle {
    mode: TrackerMode,
    tx: Option<Sender<PoseBatch>>,
    rx: Option<Receiver<PoseBatch>>,
}

impl TrackerHandle {
    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    /// Push observed poses (live mode). Returns false if the channel is full
    /// or the tracker is broadcasting.
    pub fn send(&self, batch: PoseBatch) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.try_send(batch).is_ok())
    }

    /// Next broadcast batch, if any (broadcast mode).
    pub fn try_recv(&self) -> Option<PoseBatch> {
        self.rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// All pending broadcast batches.
    pub fn drain(&self) -> Vec<PoseBatch> {
        self.rx.as_ref().map(|rx| rx.try_iter().collect()).unwrap_or_default()
    }
}

/// Channel-backed tracker.
#[derive(Debug)]
pub struct ChannelTracker {
    mode: TrackerMode,
    tx: Option<Sender<PoseBatch>>,
    rx: Option<Receiver<PoseBatch>>,
    latest: HashMap<String, Pose>,
    seq: u64,
}

impl ChannelTracker {
    pub fn new(config: &ObjectTrackerConfig) -> (Self, TrackerHandle) {
        let (tx, rx) = crossbeam_channel::bounded(config.capacity.max(1));
        let (own, theirs) = match config.mode {
            TrackerMode::Broadcast => ((Some(tx), None), (None, Some(rx))),
            TrackerMode::Live => ((None, Some(rx)), (Some(tx), None)),
        };
        let tracker = Self {
            mode: config.mode,
            tx: own.0,
            rx: own.1,
            latest: HashMap::new(),
            seq: 0,
        };
        let handle = TrackerHandle {
            mode: config.mode,
            tx: theirs.0,
            rx: theirs.1,
        };
        (tracker, handle)
    }
}

impl<P: PhysicsEngine> ObjectTracker<P> for ChannelTracker {
    fn is_live(&self) -> bool {
        self.mode == TrackerMode::Live
    }

    fn update_poses(&mut self, objects: &ObjectRegistry, physics: &mut P) -> usize {
        if let Some(rx) = &self.rx {
            for batch in rx.try_iter() {
                self.latest.extend(batch.poses);
            }
        }
        let mut updated = 0;
        for object in objects.iter() {
            let Some(pose) = self.latest.get(object.name()) else {
                continue;
            };
            match object.set_pose(physics, *pose) {
                Ok(()) if !object.is_null() => updated += 1,
                Ok(()) => {}
                Err(e) => log::warn!("tracked pose for '{}' not applied: {}", object.name(), e),
            }
        }
        updated
    }

    fn send_poses(&mut self, objects: &ObjectRegistry, physics: &P) {
        let Some(tx) = &self.tx else {
            return;
        };
        let poses = objects
            .iter()
            .filter_map(|o| o.pose(physics).map(|p| (o.name().to_string(), p)))
            .collect();
        self.seq += 1;
        match tx.try_send(PoseBatch { seq: self.seq, poses }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::debug!("tracker channel full, dropping batch {}", self.seq),
            Err(TrySendError::Disconnected(_)) => log::debug!("tracker handle dropped"),
        }
    }
}
