use crate::{
    client::{Call, ClusterClient, Race},
    config::ReplicaAddress,
    errors::DispatchError,
    racer::Outcome,
    transport::Transport,
};

/// Sends the query to every replica at once and returns the first success.
///
/// Failed attempts leave the race; once none are left the call fails with
/// the last failure. Latency history is not consulted since every replica is
/// tried anyway, but the winner's latency is still recorded.
pub(crate) async fn dispatch<T: Transport>(
    client: &ClusterClient<T>,
    call: Call<'_>,
) -> Result<(ReplicaAddress, T::Response), DispatchError> {
    let mut race: Race<T::Response> = Race::new();
    for replica in client.replicas().iter() {
        client.issue(&mut race, replica, call.query);
    }

    let mut last_failure = None;
    loop {
        if call.expired() {
            client.abandon(&mut race, true);
            return Err(DispatchError::DeadlineExceeded(call.timeout));
        }
        if race.is_empty() {
            if let Some(failure) = last_failure {
                return Err(DispatchError::AllReplicasFailed(failure));
            }
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
