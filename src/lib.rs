/*!
# Residence Tracker

A browser-facing dashboard backend for tracking residence-status (visa)
expiration deadlines, built in Rust.

## Overview

The service holds a roster of tracked people in memory, classifies each
record's deadline urgency against three configurable per-record deadline
slots, and serves the dashboard API: a filterable/sortable data listing,
summary counters, a month-calendar projection of upcoming due dates,
add/update/delete with field-level validation, CSV upload, and XLSX export
with UTF-8 download filenames.

## Architecture

The application follows a client-server architecture:

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Roster Store - ordered in-memory record collection with stable ids,
    replaced wholesale on every upload
  - Deadline Classifier - pure date arithmetic for remaining days, slot
    due dates, urgency levels and the tier-1 cumulative cap
  - View Engine - named filters, substring search and stable column sorts
    over the roster, never mutating the source
  - Calendar Projector - sparse day-bucketed projection of slot due dates
  - Change Tracker - Clean/Dirty state comparing the last local edit to
    the last successful export

### Data Persistence Layer
- CSV ingest and export (ingest-compatible column set)
- XLSX export via rust_xlsxwriter with `yyyy/mm/dd` date rendering
- Gzip-compressed bincode roster snapshots

## Key Features

- Three independent deadline slots per record (default 90/60/30 days)
- Coarse level1/level2/level3 urgency buckets for one-click filtering
- Cumulative five-year cap tracking for the 特定技能1号 status category,
  accepting ASCII and full-width digit spellings
- Field-level validation errors that name the offending field
- RFC 5987 Content-Disposition filenames on spreadsheet downloads

## Modules

- **record**: record struct, status-category families, digit normalization
- **classify**: deadline classification (days, slots, level, row status)
- **roster**: the dataset store, mutations, summary and alert selection
- **view**: filter/search/sort over the roster
- **calendar**: month projection and year-rolling navigation
- **tracker**: unsaved-change state machine
- **loader**: CSV ingest
- **downloader**: XLSX/CSV export and Content-Disposition helpers
- **saving**: roster snapshot persistence with compression
- **app**: routing and handlers

## REST API Endpoints

- `GET /api/data` - roster listing with optional filter/search/sort
- `GET /api/summary` - counters plus export/dirty state
- `GET /api/calendar?year=Y&month=M` - month projection
- `POST /api/upload` - replace the roster from a CSV upload
- `POST /api/data/add`, `PUT /api/data/update/{id}`,
  `DELETE /api/data/delete/{id}` - mutations
- `GET /api/export/alert`, `GET /api/export/processed` - XLSX downloads
*/

#[cfg(feature = "web")]
pub mod app;
pub mod calendar;
pub mod classify;
pub mod downloader;
pub mod loader;
pub mod record;
pub mod roster;
pub mod saving;
pub mod tracker;
pub mod view;

/// Re-export the core types so callers can use the crate root directly
pub use calendar::*;
pub use classify::*;
pub use downloader::*;
pub use loader::*;
pub use record::*;
pub use roster::*;
pub use saving::*;
pub use tracker::*;
pub use view::*;
