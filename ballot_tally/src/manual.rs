/*!

This is the long-form manual for `ballot_tally` and `livetally`.

## Casting a ballot

A voter casts at most one ballot per session. The ballot goes through the
following states:

* `Unvoted` nothing was sent yet
* `Submitting(c)` a ballot for candidate `c` is on its way to the backend
* `Confirmed(c)` the backend recorded a ballot for `c`
* `AlreadyRecorded` the backend holds a ballot for this voter, for a candidate
  it did not name
* `Rejected(c, failure)` the backend refused the ballot

A request is only sent when leaving `Unvoted` (or a retryable `Rejected`) for
`Submitting`. Before that, three checks are made, in this order:

1. the state must accept a cast (not `Submitting`, not `Confirmed`)
2. an identity must be present
3. a candidate must be picked, and the personal data must be complete: all
   fields filled in, and a national ID of exactly 8 digits

A refused check changes nothing and sends nothing.

The backend has the last word on eligibility. When it answers that the voter
already voted and names the candidate, the session adopts that answer and
moves to `Confirmed` for that candidate. When it does not name the candidate,
the state is `AlreadyRecorded` and casting stays blocked for the rest of the
session.

When the backend refuses the credential, the identity is dropped from the
session: the next cast is refused locally until the voter signs in again.

## Reconciling the tally

The backend does not report a ballot right away. To avoid showing a tally that
ignores the ballot just cast, the displayed tally is the last snapshot plus one
vote for the voter's candidate, until a snapshot reports it.

The snapshot is considered to report the ballot as soon as the count of the
candidate goes above the count that was known when the ballot was submitted
(the baseline). If no snapshot was known yet, the baseline is read from the
first snapshot applied after the submission started, and the local vote is
shown until then. From that point on, the local vote is never added again.

`livetally --vote` waits for the first snapshot before sending the ballot.

| snapshot count for `c` | baseline | displayed |
|------------------------|----------|-----------|
| 10                     | 10       | 11        |
| 10                     | 10       | 11        |
| 11                     | 10       | 11        |
| 12                     | 10       | 12        |

A snapshot whose total (after adding the local vote) is below the displayed
total is older than what is on screen. It is dropped and logged.

The displayed total is always the sum of the displayed counts. If the backend
reports a total that disagrees with its counts, the counts win.

## Ranking

Candidates are sorted by decreasing count. Candidates with the same count are
sorted by identifier, so two rankings of the same tally are always identical.
Percentages are rounded to one decimal, and are all 0 when nobody voted.

## Polling

The snapshot is read right away, then every `pollIntervalMs` milliseconds
(10 seconds by default). A read never starts while another one is in flight:
if a read takes longer than the interval, the missed ticks are skipped.
A manual refresh skips the wait and joins the read in flight if there is one.

Once the poller is cancelled, no snapshot is delivered anymore, even the one
of a read that was in flight.

## Configuration

`livetally` reads an optional configuration file in JSON:

```text
{
  "apiUrl": "http://localhost:8000/api",
  "pollIntervalMs": 10000,
  "electionYear": 2026,
  "accessToken": "eyJhbGciOi...",
  "userId": "voter-1",
  "isAdmin": false,
  "ballot": {
    "fullName": "Rosa Quispe",
    "nationalId": "45873210",
    "phone": "987654321",
    "department": "Lima",
    "province": "Lima",
    "district": "Miraflores",
    "address": "Av. Larco 123"
  }
}
```

All the fields are optional. The command line flags take precedence over the
file: `--api-url`, `--token`, `--interval-ms`, `--year`.

With `--vote <candidate-id>`, a ballot is cast for that candidate using the
`ballot` section of the configuration.

Logs are controlled with `RUST_LOG`, and `--verbose` turns on the debug logs.

 */
