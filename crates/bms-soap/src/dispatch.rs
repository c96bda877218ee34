//! Request dispatch: validation, routing by indicator, and response-code
//! mapping.

use bms_core::{
  Error, Result,
  envelope::{HeaderPolicy, Indicator, Request},
  response::{Response, ResponseCode},
  store::RecordStore,
};
use tracing::{error, info, warn};

use crate::handlers::{self, Call};

/// Table name reported when the payload carries no `listName`.
const NO_TABLE: &str = "-";

/// Validate `request` and run it against `store`. Never fails: every outcome
/// is a [`Response`].
pub async fn dispatch<S: RecordStore>(
  store: &S,
  policy: &HeaderPolicy,
  request: &Request,
) -> Response {
  let indicator = match request.validate(policy) {
    Ok(indicator) => indicator,
    Err(rejection) => {
      warn!(code = %rejection.code, message = %rejection.message, "request rejected");
      return rejection.into();
    }
  };
  info!(
    indicator = %indicator,
    correlation_id = request.correlation_id().unwrap_or("-"),
    "dispatching request"
  );

  match route(store, indicator, request).await {
    Ok(response) => response,
    Err(err) => {
      let response = Response::from_error(&err);
      if response.response_code == ResponseCode::InternalError {
        error!(%indicator, error = %err, "operation failed");
      } else {
        warn!(%indicator, error = %err, code = %response.response_code, "operation rejected");
      }
      response
    }
  }
}

async fn route<S: RecordStore>(
  store: &S,
  indicator: Indicator,
  request: &Request,
) -> Result<Response> {
  let call = Call::new(request, request.payload()?);

  if indicator.validates_table_early() {
    let table = call.list_name().unwrap_or(NO_TABLE);
    if !store.validator().is_valid(table) {
      return Err(Error::InvalidTable(table.to_owned()));
    }
  }

  match indicator {
    Indicator::Insert => handlers::insert::handler(store, &call).await,
    Indicator::Update => handlers::update::handler(store, &call).await,
    Indicator::Lookup => handlers::lookup::handler(store, &call).await,
    Indicator::Hof => handlers::hof::handler(store, &call).await,
    Indicator::Nomination => handlers::nomination::handler(store, &call).await,
    Indicator::InsertBeneficiary => handlers::beneficiary::insert(store, &call).await,
    Indicator::UpdateBeneficiary => handlers::beneficiary::update(store, &call).await,
    Indicator::SplitBeneficiary => handlers::beneficiary::split(store, &call).await,
  }
}
