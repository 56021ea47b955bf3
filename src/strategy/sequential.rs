use crate::{
    client::{Call, ClusterClient, Race},
    config::ReplicaAddress,
    errors::DispatchError,
    racer::Outcome,
    transport::Transport,
};

/// Tries replicas one at a time, fastest first.
///
/// Every replica but the last gets `timeout / N` before it is abandoned in
/// favour of the next one. The last replica races the global deadline. A call
/// in which every attempt failed outright ends with `AllReplicasFailed`; once
/// any attempt has been cut off by its slice, running out of replicas is a
/// timeout.
pub(crate) async fn dispatch<T: Transport>(
    client: &ClusterClient<T>,
    call: Call<'_>,
) -> Result<(ReplicaAddress, T::Response), DispatchError> {
    let ordered = client.ordered_replicas();
    let part_budget = call.part_budget(ordered.len());

    let mut last_failure = None;
    let mut any_slow = false;

    for (idx, replica) in ordered.iter().enumerate() {
        if call.expired() {
            return Err(DispatchError::DeadlineExceeded(call.timeout));
        }

        let is_last = idx + 1 == ordered.len();
        let until = if is_last {
            call.deadline
        } else {
            call.slice_end(part_budget)
        };

        let mut race: Race<T::Response> = Race::new();
        client.issue(&mut race, replica, call.query);

        match race.race(until).await {
            Outcome::Completed { tag, value } => {
                client.on_success(&tag);
                return Ok((tag.replica, value));
            }
            Outcome::Failed { tag, error } => {
                last_failure = Some(client.on_failure(tag, error));
            }
            Outcome::DeadlineElapsed => {
                any_slow = true;
                client.abandon(&mut race, true);
            }
        }
    }

    match last_failure {
        Some(failure) if !any_slow && !call.expired() => {
            Err(DispatchError::AllReplicasFailed(failure))
        }
        _ => Err(DispatchError::DeadlineExceeded(call.timeout)),
    }
}
