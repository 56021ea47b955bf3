use crate::{
    client::{Call, ClusterClient, Race},
    config::ReplicaAddress,
    errors::{DispatchError, ReplicaFailure},
    racer::Outcome,
    transport::Transport,
};

/// Issues replicas fastest first, hedging to the next one whenever nothing has
/// answered within `timeout / N`.
///
/// Unlike the sequential policy, attempts are never abandoned when a new one
/// starts: all of them keep racing until one succeeds, all of them fail, or
/// the global deadline passes.
pub(crate) async fn dispatch<T: Transport>(
    client: &ClusterClient<T>,
    call: Call<'_>,
) -> Result<(ReplicaAddress, T::Response), DispatchError> {
    let ordered = client.ordered_replicas();
    let part_budget = call.part_budget(ordered.len());

    let mut race: Race<T::Response> = Race::new();
    let mut last_failure: Option<ReplicaFailure> = None;

    for replica in &ordered {
        if call.expired() {
            client.abandon(&mut race, true);
            return Err(DispatchError::DeadlineExceeded(call.timeout));
        }

        client.issue(&mut race, replica, call.query);
        let hedge_at = call.slice_end(part_budget);

        loop {
            match race.race(hedge_at).await {
                Outcome::Completed { tag, value } => {
                    client.on_success(&tag);
                    client.abandon(&mut race, false);
                    return Ok((tag.replica, value));
                }
                Outcome::Failed { tag, error } => {
                    last_failure = Some(client.on_failure(tag, error));
                    // Nothing left in flight: no point waiting out the slice.
                    if race.is_empty() {
                        break;
                    }
                }
                Outcome::DeadlineElapsed => {
                    if call.expired() {
                        client.abandon(&mut race, true);
                        return Err(DispatchError::DeadlineExceeded(call.timeout));
                    }
                    tracing::debug!(in_flight = race.len(), "hedging to next replica");
                    break;
                }
            }
        }
    }

    // Every replica has been issued; wait out whatever is still in flight.
    loop {
        if call.expired() {
            client.abandon(&mut race, true);
            return Err(DispatchError::DeadlineExceeded(call.timeout));
        }
        if race.is_empty() {
            return match last_failure {
                Some(failure) => Err(DispatchError::AllReplicasFailed(failure)),
                None => Err(DispatchError::DeadlineExceeded(call.timeout)),
            };
        }

        match race.race(call.deadline).await {
            Outcome::Completed { tag, value } => {
                client.on_success(&tag);
                client.abandon(&mut race, false);
                return Ok((tag.replica, value));
            }
            Outcome::Failed { tag, error } => {
                last_failure = Some(client.on_failure(tag, error));
            }
            Outcome::DeadlineElapsed => {
                client.abandon(&mut race, true);
                return Err(DispatchError::DeadlineExceeded(call.timeout));
            }
        }
    }
}
