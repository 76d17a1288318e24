use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::StreamEvent;
use crate::models::itinerary::{DayItem, DayStats};
use crate::services::itinerary_builder::{build_day_items, day_stats, normalize_day};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("day {0} is not on the board")]
    UnknownDay(u32),

    #[error("index {index} is out of bounds for day {day}")]
    OutOfBounds { day: u32, index: usize },
}

/// Day-keyed itinerary state, filled from the generation stream and then
/// edited by dragging cards around.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraryBoard {
    pub travel_plan_id: Option<String>,
    pub days: BTreeMap<u32, Vec<DayItem>>,
    pub stats: BTreeMap<u32, DayStats>,
    /// Raw model output received so far.
    pub streamed_text: String,
    pub stage: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ItineraryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears previous results before a new generation.
    pub fn begin(&mut self) {
        *self = Self {
            loading: true,
            ..Self::default()
        };
    }

    /// A cancelled stream keeps whatever arrived and just stops loading.
    pub fn cancel(&mut self) {
        self.loading = false;
    }

    pub fn day(&self, day_number: u32) -> &[DayItem] {
        self.days.get(&day_number).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Started { travel_plan_id, .. } => {
                self.travel_plan_id = Some(travel_plan_id.clone());
                self.loading = true;
            }
            StreamEvent::Progress { stage } => self.stage = Some(stage.clone()),
            StreamEvent::Token { delta } => self.streamed_text.push_str(delta),
            StreamEvent::Day(summary) => {
                self.days.insert(summary.day_number, summary.items.clone());
                self.stats.insert(summary.day_number, summary.stats.clone());
            }
            StreamEvent::Result(result) => {
                for detail in &result.itinerary_details {
                    if self.days.contains_key(&detail.day_number) {
                        continue;
                    }
                    let mut day = detail.itinerary.clone();
                    let (spots, restaurants) = normalize_day(&mut day);
                    self.days.insert(
                        detail.day_number,
                        build_day_items(detail.day_number, &spots, &restaurants),
                    );
                    self.stats
                        .insert(detail.day_number, day_stats(&day, &spots, &restaurants));
                }
                self.loading = false;
            }
            StreamEvent::Error { message } => {
                self.error = Some(message.clone());
                self.loading = false;
            }
            StreamEvent::Heartbeat { .. } | StreamEvent::Other { .. } => {}
        }
    }

    /// Moves a card within one day.
    pub fn reorder(&mut self, day_number: u32, from: usize, to: usize) -> Result<(), BoardError> {
        let items = self
            .days
            .get_mut(&day_number)
            .ok_or(BoardError::UnknownDay(day_number))?;
        for index in [from, to] {
            if index >= items.len() {
                return Err(BoardError::OutOfBounds {
                    day: day_number,
                    index,
                });
            }
        }
        let item = items.remove(from);
        items.insert(to, item);
        Ok(())
    }

    /// Moves a card to another day. `to_index` may equal the target length to append.
    pub fn move_item(
        &mut self,
        from_day: u32,
        from_index: usize,
        to_day: u32,
        to_index: usize,
    ) -> Result<(), BoardError> {
        if from_day == to_day {
            return self.reorder(from_day, from_index, to_index);
        }

        let source_len = self
            .days
            .get(&from_day)
            .ok_or(BoardError::UnknownDay(from_day))?
            .len();
        let target_len = self
            .days
            .get(&to_day)
            .ok_or(BoardError::UnknownDay(to_day))?
            .len();
        if from_index >= source_len {
            return Err(BoardError::OutOfBounds {
                day: from_day,
                index: from_index,
            });
        }
        if to_index > target_len {
            return Err(BoardError::OutOfBounds {
                day: to_day,
                index: to_index,
            });
        }

        if let Some(item) = self.days.get_mut(&from_day).map(|items| items.remove(from_index)) {
            if let Some(target) = self.days.get_mut(&to_day) {
                target.insert(to_index, item);
            }
        }
        Ok(())
    }
}
