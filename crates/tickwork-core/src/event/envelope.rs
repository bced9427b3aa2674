// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Type-erased events, used wherever an event has to be stored before dispatch.

use super::Event;
use crate::error::EventError;
use std::any::{self, Any, TypeId};
use std::fmt;

/// Rejects the values that can never be meaningful events.
pub(crate) fn validate(event: &dyn Any, type_name: &'static str) -> Result<(), EventError> {
    if event.is::<()>() {
        return Err(EventError::Empty);
    }
    if event.is::<Box<dyn Any>>()
        || event.is::<Box<dyn Any + Send>>()
        || event.is::<EventEnvelope>()
        || event.is::<SendEventEnvelope>()
    {
        return Err(EventError::DoubleBoxed { type_name });
    }
    Ok(())
}

/// An owned event whose concrete type has been erased.
pub struct EventEnvelope {
    type_id: TypeId,
    type_name: &'static str,
    payload: Box<dyn Any>,
}

impl EventEnvelope {
    /// Wraps `event`, rejecting malformed values up front.
    pub fn new<E: Event>(event: E) -> Result<Self, EventError> {
        let type_name = any::type_name::<E>();
        validate(&event, type_name)?;
        Ok(Self {
            type_id: TypeId::of::<E>(),
            type_name,
            payload: Box::new(event),
        })
    }

    /// The runtime type the envelope dispatches as.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrows the payload.
    pub fn payload(&self) -> &dyn Any {
        self.payload.as_ref()
    }

    /// Recovers the concrete event, or gives the envelope back on a type mismatch.
    pub fn downcast<E: Event>(self) -> Result<E, Self> {
        if self.type_id != TypeId::of::<E>() {
            return Err(self);
        }
        let Self {
            type_id,
            type_name,
            payload,
        } = self;
        payload.downcast::<E>().map(|event| *event).map_err(|payload| Self {
            type_id,
            type_name,
            payload,
        })
    }
}

impl fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// An erased event that may cross threads.
///
/// Produced on background threads and turned into an [`EventEnvelope`] once it
/// reaches the dispatch thread.
pub struct SendEventEnvelope {
    type_id: TypeId,
    type_name: &'static str,
    payload: Box<dyn Any + Send>,
}

impl SendEventEnvelope {
    /// Wraps `event`, rejecting malformed values up front.
    pub fn new<E: Event + Send>(event: E) -> Result<Self, EventError> {
        let type_name = any::type_name::<E>();
        validate(&event, type_name)?;
        Ok(Self {
            type_id: TypeId::of::<E>(),
            type_name,
            payload: Box::new(event),
        })
    }

    /// The type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for SendEventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendEventEnvelope")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl From<SendEventEnvelope> for EventEnvelope {
    fn from(envelope: SendEventEnvelope) -> Self {
        Self {
            type_id: envelope.type_id,
            type_name: envelope.type_name,
            payload: envelope.payload,
        }
    }
}
