//! Booking service for labbook.
//!
//! Lifecycle of a booking: a [`BookingInput`] is validated and becomes a
//! confirmed booking; confirmed bookings can be rescheduled or edited by
//! their owner or an administrator; cancellation is terminal.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::availability::check_availability;
use super::error::BookingError;
use super::repository::{BookingRepository, BookingRewrite, NewBooking, SlotWrite};
use super::types::{
    normalize_attendees, Availability, Booking, BookingChanges, BookingFilter, BookingInput,
    BookingStatus, Interval,
};
use crate::auth::{can_modify_booking, Requester};
use crate::validation::{
    validate_description, validate_resource, validate_title, ValidationErrors,
};

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn validate_fields(
    title: &str,
    description: Option<&str>,
    resource: Option<&str>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(validate_title(title));
    errors.check(validate_description(description));
    if let Some(resource) = resource {
        errors.check(validate_resource(resource));
    }
    errors.into_result()
}

/// Booking use cases.
#[derive(Clone)]
pub struct BookingService {
    pool: SqlitePool,
    default_resource: String,
}

impl BookingService {
    /// Create a service booking `default_resource` when a request names no lab.
    pub fn new(pool: SqlitePool, default_resource: impl Into<String>) -> Self {
        Self {
            pool,
            default_resource: default_resource.into(),
        }
    }

    fn repo(&self) -> BookingRepository<'_> {
        BookingRepository::new(&self.pool)
    }

    /// The lab used when a request names none.
    pub fn default_resource(&self) -> &str {
        &self.default_resource
    }

    fn resolve_resource(&self, resource: Option<&str>) -> String {
        resource
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_resource)
            .to_string()
    }

    /// Explain a write rejected for referencing a missing user.
    async fn unknown_user_error(&self, attendees: &[i64]) -> BookingError {
        match self.repo().unknown_users(attendees).await {
            Ok(unknown) if unknown.is_empty() => BookingError::OwnerNotFound,
            Ok(unknown) => BookingError::UnknownAttendee(unknown),
            Err(e) => e.into(),
        }
    }

    async fn ensure_attendees_exist(&self, attendees: &[i64]) -> Result<(), BookingError> {
        let unknown = self.repo().unknown_users(attendees).await?;
        if unknown.is_empty() {
            Ok(())
        } else {
            debug!("Unknown attendees: {:?}", unknown);
            Err(BookingError::UnknownAttendee(unknown))
        }
    }

    /// Report whether an interval is free in a lab.
    pub async fn check_availability(
        &self,
        resource: Option<&str>,
        interval: &Interval,
        exclude_id: Option<i64>,
    ) -> Result<Availability, BookingError> {
        let resource = self.resolve_resource(resource);
        validate_resource(&resource).map_err(ValidationErrors::from)?;
        check_availability(&self.pool, &resource, interval, exclude_id).await
    }

    /// Create a confirmed booking owned by the requester.
    pub async fn create(
        &self,
        input: BookingInput,
        requester: &Requester,
    ) -> Result<Booking, BookingError> {
        let resource = self.resolve_resource(input.resource.as_deref());
        validate_fields(&input.title, input.description.as_deref(), Some(&resource))?;
        let interval = Interval::new(input.start_time, input.end_time)?;
        self.ensure_attendees_exist(&input.attendees).await?;

        let new_booking = NewBooking {
            resource,
            title: input.title.trim().to_string(),
            description: clean_description(input.description),
            interval,
            owner_id: requester.user_id,
            attendees: normalize_attendees(&input.attendees),
        };

        match self.repo().create_if_free(&new_booking).await? {
            SlotWrite::Written(booking) => {
                info!(
                    booking_id = booking.id,
                    owner_id = booking.owner_id,
                    resource = %booking.resource,
                    "Booking created"
                );
                Ok(booking)
            }
            SlotWrite::Conflict(conflicts) => {
                debug!(conflicts = conflicts.len(), "Booking rejected: slot taken");
                Err(BookingError::SlotConflict { conflicts })
            }
            SlotWrite::UnknownUser => {
                debug!(owner_id = requester.user_id, "Booking rejected: unknown user");
                Err(self.unknown_user_error(&new_booking.attendees).await)
            }
            SlotWrite::Missing => Err(BookingError::Internal(
                "booking vanished during creation".to_string(),
            )),
        }
    }

    /// Move or edit a confirmed booking.
    ///
    /// The availability check ignores the booking itself, so keeping the
    /// same interval always succeeds.
    pub async fn reschedule(
        &self,
        id: i64,
        changes: BookingChanges,
        requester: &Requester,
    ) -> Result<Booking, BookingError> {
        let current = self.get(id).await?;
        can_modify_booking(requester, current.owner_id)?;
        if !current.is_confirmed() {
            return Err(BookingError::Cancelled);
        }

        let title = changes.title.unwrap_or_else(|| current.title.clone());
        let description = match changes.description {
            Some(description) => clean_description(Some(description)),
            None => current.description.clone(),
        };
        validate_fields(&title, description.as_deref(), None)?;

        let interval = Interval::new(
            changes.start_time.unwrap_or(current.start_time),
            changes.end_time.unwrap_or(current.end_time),
        )?;

        if let Some(ref attendees) = changes.attendees {
            self.ensure_attendees_exist(attendees).await?;
        }

        let rewrite = BookingRewrite {
            title: title.trim().to_string(),
            description,
            interval,
            attendees: changes.attendees.as_deref().map(normalize_attendees),
        };

        match self.repo().rewrite_if_free(id, &rewrite).await? {
            SlotWrite::Written(booking) => {
                info!(booking_id = id, requester_id = requester.user_id, "Booking rescheduled");
                Ok(booking)
            }
            SlotWrite::Conflict(conflicts) => {
                debug!(booking_id = id, conflicts = conflicts.len(), "Reschedule rejected: slot taken");
                Err(BookingError::SlotConflict { conflicts })
            }
            SlotWrite::UnknownUser => {
                let attendees = rewrite.attendees.unwrap_or_default();
                Err(self.unknown_user_error(&attendees).await)
            }
            SlotWrite::Missing => match self.repo().get_by_id(id).await? {
                Some(_) => Err(BookingError::Cancelled),
                None => Err(BookingError::NotFound),
            },
        }
    }

    /// Cancel a booking. Cancelling twice succeeds and changes nothing.
    pub async fn cancel(&self, id: i64, requester: &Requester) -> Result<Booking, BookingError> {
        let current = self.get(id).await?;
        can_modify_booking(requester, current.owner_id)?;

        if !current.is_confirmed() {
            debug!(booking_id = id, "Booking already cancelled");
            return Ok(current);
        }

        if !self.repo().set_status(id, BookingStatus::Cancelled).await? {
            return Err(BookingError::NotFound);
        }
        info!(booking_id = id, requester_id = requester.user_id, "Booking cancelled");
        self.get(id).await
    }

    /// List bookings, ordered by start time.
    pub async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, BookingError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from >= to {
                return Err(BookingError::InvalidInterval);
            }
        }
        Ok(self.repo().list(filter).await?)
    }

    /// Fetch a single booking.
    pub async fn get(&self, id: i64) -> Result<Booking, BookingError> {
        self.repo().get_by_id(id).await?.ok_or(BookingError::NotFound)
    }
}

impl std::fmt::Debug for BookingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingService")
            .field("default_resource", &self.default_resource)
            .finish()
    }
}
