// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;

use crate::{controller::Driver, player::Status};

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    #[default]
    Keyboard,
}

impl Controller {
    /// Creates the driver for this controller.
    pub fn driver(&self, status_rx: watch::Receiver<Status>) -> Arc<dyn Driver> {
        match self {
            Controller::Keyboard => Arc::new(crate::controller::keyboard::Driver::new(status_rx)),
        }
    }
}
